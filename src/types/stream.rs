use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex, MutexGuard};

use crate::types::rax::Rax;

/// A stream entry id: milliseconds-sequence, ordered by (ms, seq).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    pub fn is_zero(&self) -> bool {
        self.ms == 0 && self.seq == 0
    }

    /// The fixed-width rax key: both halves zero-padded to 20 digits so
    /// lexicographic byte order equals numeric (ms, seq) order.
    pub fn encode(&self) -> Vec<u8> {
        format!("{:020}-{:020}", self.ms, self.seq).into_bytes()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StreamIdError {
    #[error("unexpected number of '-' in the stream id")]
    Format,
    #[error("stream id part is not an unsigned integer")]
    NotAnInteger,
}

/// An XADD id argument: fully auto (`*`), auto sequence (`<ms>-*`), or
/// explicit (`<ms>-<seq>`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdSpec {
    Auto,
    AutoSeq(u64),
    Explicit(StreamId),
}

impl IdSpec {
    pub fn parse(s: &str) -> Result<Self, StreamIdError> {
        if s == "*" {
            return Ok(IdSpec::Auto);
        }

        let (ms_str, seq_str) = s.split_once('-').ok_or(StreamIdError::Format)?;
        let ms: u64 = ms_str.parse().map_err(|_| StreamIdError::NotAnInteger)?;

        if seq_str == "*" {
            return Ok(IdSpec::AutoSeq(ms));
        }

        let seq: u64 = seq_str.parse().map_err(|_| StreamIdError::NotAnInteger)?;
        Ok(IdSpec::Explicit(StreamId::new(ms, seq)))
    }

    /// The id an XREAD cursor starts from; auto markers degrade to their
    /// numeric parts, matching how comparisons treated them upstream.
    pub fn as_read_position(&self) -> StreamId {
        match *self {
            IdSpec::Auto => StreamId::MIN,
            IdSpec::AutoSeq(ms) => StreamId::new(ms, 0),
            IdSpec::Explicit(id) => id,
        }
    }
}

/// Parse an XRANGE endpoint. `-` and `+` are the open ends; a bare ms
/// fills the sequence with 0 (start) or u64::MAX (end).
pub fn parse_range_id(s: &str, is_end: bool) -> Result<StreamId, StreamIdError> {
    match s {
        "-" => return Ok(StreamId::MIN),
        "+" => return Ok(StreamId::MAX),
        _ => {}
    }

    match s.split_once('-') {
        None => {
            let ms: u64 = s.parse().map_err(|_| StreamIdError::NotAnInteger)?;
            let seq = if is_end { u64::MAX } else { 0 };
            Ok(StreamId::new(ms, seq))
        }
        Some((ms_str, seq_str)) => {
            let ms: u64 = ms_str.parse().map_err(|_| StreamIdError::NotAnInteger)?;
            let seq: u64 = seq_str.parse().map_err(|_| StreamIdError::NotAnInteger)?;
            Ok(StreamId::new(ms, seq))
        }
    }
}

/// Wall-clock milliseconds since the UNIX epoch.
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

/// One appended entry. Fields keep their submission order so replies echo
/// the same sequence of name/value pairs that XADD received.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

/// A reader blocked in XREAD. `slot` tags the shared wake channel with the
/// position of the stream that fired.
#[derive(Debug)]
pub struct StreamListener {
    pub slot: usize,
    pub waiting_id: StreamId,
    wake: mpsc::Sender<usize>,
}

impl StreamListener {
    pub fn new(slot: usize, waiting_id: StreamId, wake: mpsc::Sender<usize>) -> Self {
        StreamListener {
            slot,
            waiting_id,
            wake,
        }
    }

    /// Non-blocking wake; a full channel means the reader is already
    /// pending, so the skip loses nothing.
    pub fn notify(&self) {
        let _ = self.wake.try_send(self.slot);
    }
}

/// One append-only stream: last-entry pointer, id-ordered rax index, and
/// the listeners currently blocked on it.
#[derive(Debug, Default)]
pub struct Stream {
    last_entry: Option<StreamEntry>,
    index: Rax<StreamEntry>,
    listeners: Vec<Arc<StreamListener>>,
}

impl Stream {
    pub fn new() -> Self {
        Stream::default()
    }

    pub fn last_id(&self) -> Option<StreamId> {
        self.last_entry.as_ref().map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Resolve an id spec against this stream's last entry. Auto sequence
    /// numbers continue the last entry's run when the ms parts match,
    /// otherwise they restart (from 1 when ms is 0, since 0-0 is reserved).
    pub fn resolve_id(&self, spec: IdSpec, now_ms: u64) -> StreamId {
        let ms = match spec {
            IdSpec::Auto => now_ms,
            IdSpec::AutoSeq(ms) => ms,
            IdSpec::Explicit(id) => return id,
        };

        let seq = match &self.last_entry {
            Some(last) if last.id.ms == ms => last.id.seq + 1,
            _ if ms == 0 => 1,
            _ => 0,
        };

        StreamId::new(ms, seq)
    }

    /// Append an entry. The caller must have validated id ordering.
    pub fn insert(&mut self, entry: StreamEntry) {
        self.index.insert(&entry.id.encode(), entry.clone());
        self.last_entry = Some(entry);
    }

    /// Entries with start <= id <= end, in ascending id order.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        let mut result = Vec::new();
        let mut cursor = self.index.seek_ge(&start.encode());
        while let Some(entry) = cursor {
            if entry.id > end {
                break;
            }
            result.push(entry.clone());
            cursor = self.index.successor(&entry.id.encode());
        }
        result
    }

    /// Entries strictly after `id`, in ascending id order.
    pub fn entries_after(&self, id: StreamId) -> Vec<StreamEntry> {
        let mut result = Vec::new();
        let mut cursor = self.index.successor(&id.encode());
        while let Some(entry) = cursor {
            result.push(entry.clone());
            cursor = self.index.successor(&entry.id.encode());
        }
        result
    }

    pub fn add_listener(&mut self, listener: Arc<StreamListener>) {
        self.listeners.push(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<StreamListener>) {
        self.listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Wake every listener whose cursor lies before the freshly inserted id.
    pub fn notify_listeners(&self, inserted: StreamId) {
        for listener in &self.listeners {
            if inserted > listener.waiting_id {
                listener.notify();
            }
        }
    }
}

/// All streams, behind one mutex. Handlers lock the whole map for the
/// duration of a command, which is what keeps XADD's resolve-validate-
/// insert-notify sequence atomic.
#[derive(Debug, Default)]
pub struct StreamStore {
    streams: Mutex<HashMap<String, Stream>>,
}

impl StreamStore {
    pub fn new() -> Self {
        StreamStore::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, Stream>> {
        self.streams.lock().await
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.streams.lock().await.contains_key(key)
    }
}
