use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Per-client connection state. A non-empty channel set puts the
/// connection in subscribed mode, which restricts the command surface.
#[derive(Debug)]
pub struct ClientState {
    pub id: u64,
    pub name: Option<String>,
    pub channels: HashSet<String>,
    pub should_close: bool,
}

impl ClientState {
    pub fn new() -> Self {
        ClientState {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
            channels: HashSet::new(),
            should_close: false,
        }
    }

    pub fn in_subscribed_mode(&self) -> bool {
        !self.channels.is_empty()
    }
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState::new()
    }
}
