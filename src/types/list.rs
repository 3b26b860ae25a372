use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// A consumer blocked in BLPOP, registered on one list. All of a caller's
/// registrations share one wake channel; `slot` identifies which of its
/// keys fired. The channel capacity equals the number of registrations, so
/// a producer's `try_send` cannot fail: each registration is consumed by
/// at most one producer, and each consumed registration sends exactly once.
#[derive(Debug)]
pub struct PopWaiter {
    slot: usize,
    wake: mpsc::Sender<usize>,
}

impl PopWaiter {
    pub fn new(slot: usize, wake: mpsc::Sender<usize>) -> Self {
        PopWaiter { slot, wake }
    }

    fn signal(&self) {
        let _ = self.wake.try_send(self.slot);
    }
}

#[derive(Debug, Default)]
struct ListState {
    items: VecDeque<Vec<u8>>,
    /// New waiters go in at the front; producers take from the back, so the
    /// longest-blocked consumer wins.
    waiters: VecDeque<Arc<PopWaiter>>,
}

/// One named list: a deque of values plus the queue of blocked consumers.
#[derive(Debug, Default)]
pub struct BlockingList {
    state: Mutex<ListState>,
}

/// Which end a push lands on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushSide {
    Front,
    Back,
}

impl BlockingList {
    /// Push values, then hand exactly one parked waiter to the caller.
    /// The signal itself must happen after this returns (the lock is gone
    /// by then), mirroring the producer contract: element published and
    /// waiter dequeued first, wake second.
    pub async fn push(&self, side: PushSide, values: Vec<Vec<u8>>) -> usize {
        let waiter;
        let len;
        {
            let mut state = self.state.lock().await;
            for value in values {
                match side {
                    PushSide::Front => state.items.push_front(value),
                    PushSide::Back => state.items.push_back(value),
                }
            }
            len = state.items.len();
            waiter = state.waiters.pop_back();
        }
        if let Some(waiter) = waiter {
            waiter.signal();
        }
        len
    }

    pub async fn pop_front(&self) -> Option<Vec<u8>> {
        self.state.lock().await.items.pop_front()
    }

    /// Pop up to `count` values from the front.
    pub async fn pop_front_count(&self, count: usize) -> Vec<Vec<u8>> {
        let mut state = self.state.lock().await;
        let take = count.min(state.items.len());
        state.items.drain(..take).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// The values at normalized positions [start, stop], empty when the
    /// range collapses.
    pub async fn range(&self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        match normalize_range(state.items.len(), start, stop) {
            Some((from, to)) => state.items.range(from..=to).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn register_waiter(&self, waiter: Arc<PopWaiter>) {
        self.state.lock().await.waiters.push_front(waiter);
    }

    /// Remove a specific registration. Returning false means a producer
    /// already consumed it, which implies an element was published for us.
    pub async fn remove_waiter(&self, waiter: &Arc<PopWaiter>) -> bool {
        let mut state = self.state.lock().await;
        let before = state.waiters.len();
        state.waiters.retain(|registered| !Arc::ptr_eq(registered, waiter));
        state.waiters.len() != before
    }
}

/// Name → list registry. Creation and deletion both go through the
/// registry lock, so lookups never observe a half-removed list.
#[derive(Debug, Default)]
pub struct ListStore {
    lists: Mutex<HashMap<String, Arc<BlockingList>>>,
}

impl ListStore {
    pub fn new() -> Self {
        ListStore::default()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<BlockingList>> {
        self.lists.lock().await.get(key).cloned()
    }

    pub async fn create_or_get(&self, key: &str) -> Arc<BlockingList> {
        self.lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drop the list if it holds neither items nor waiters. Emptiness is
    /// re-checked with both locks held (registry first, then list), so a
    /// concurrent refill between a pop and this call survives.
    pub async fn remove_if_unused(&self, key: &str) {
        let mut lists = self.lists.lock().await;
        let empty = match lists.get(key) {
            Some(list) => {
                let state = list.state.lock().await;
                state.items.is_empty() && state.waiters.is_empty()
            }
            None => return,
        };
        if empty {
            debug!(key, "dropping empty list");
            lists.remove(key);
        }
    }
}

/// Clamp LRANGE-style indices (negative = from the tail) onto [0, len).
/// None when the normalized window is empty.
pub fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;

    let clamp = |index: i64| -> i64 {
        if index >= 0 {
            index.min(len - 1)
        } else {
            (len + index).max(0)
        }
    };

    let from = clamp(start);
    let to = clamp(stop);
    if from > to {
        return None;
    }
    Some((from as usize, to as usize))
}
