use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::debug;

use crate::resp::RespValue;

/// A stored string value with an optional expiry deadline.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Vec<u8>,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// A request delivered on a shard's inbox. Every variant that expects an
/// answer carries a oneshot sender; the executor's send is allowed to fail
/// when the requesting connection has already gone away.
#[derive(Debug)]
pub enum ShardCommand {
    Get {
        key: String,
        reply: oneshot::Sender<RespValue>,
    },
    Set {
        key: String,
        value: Vec<u8>,
        /// Milliseconds. Negative = no expiry, zero = no-op OK, positive = now+ttl.
        ttl_ms: i64,
        nx: bool,
        reply: oneshot::Sender<RespValue>,
    },
    Del {
        key: String,
        reply: oneshot::Sender<RespValue>,
    },
    Exists {
        key: String,
        reply: oneshot::Sender<RespValue>,
    },
    Type {
        key: String,
        reply: oneshot::Sender<RespValue>,
    },
    Cleanup,
}

/// The shard executor. Exactly one of these runs per shard; it is the only
/// task that ever touches the shard's map, so no lock is involved.
pub async fn run(shard_index: usize, mut inbox: mpsc::Receiver<ShardCommand>) {
    let mut kv: HashMap<String, Entry> = HashMap::new();

    while let Some(cmd) = inbox.recv().await {
        match cmd {
            ShardCommand::Get { key, reply } => {
                let _ = reply.send(handle_get(&mut kv, &key));
            }
            ShardCommand::Set {
                key,
                value,
                ttl_ms,
                nx,
                reply,
            } => {
                let _ = reply.send(handle_set(&mut kv, key, value, ttl_ms, nx));
            }
            ShardCommand::Del { key, reply } => {
                let _ = reply.send(handle_del(&mut kv, &key));
            }
            ShardCommand::Exists { key, reply } => {
                let _ = reply.send(handle_exists(&mut kv, &key));
            }
            ShardCommand::Type { key, reply } => {
                let _ = reply.send(handle_type(&mut kv, &key));
            }
            ShardCommand::Cleanup => {
                let before = kv.len();
                let now = Instant::now();
                kv.retain(|_, entry| !entry.is_expired(now));
                if kv.len() != before {
                    debug!(
                        shard = shard_index,
                        removed = before - kv.len(),
                        "cleanup removed expired keys"
                    );
                }
            }
        }
    }
}

/// Look up a key, removing it if its deadline has passed.
fn live_value<'a>(kv: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
    let now = Instant::now();
    if kv.get(key).is_some_and(|entry| entry.is_expired(now)) {
        kv.remove(key);
        return None;
    }
    kv.get(key)
}

fn handle_get(kv: &mut HashMap<String, Entry>, key: &str) -> RespValue {
    match live_value(kv, key) {
        Some(entry) => RespValue::bulk_string(entry.value.clone()),
        None => RespValue::null_bulk_string(),
    }
}

fn handle_set(
    kv: &mut HashMap<String, Entry>,
    key: String,
    value: Vec<u8>,
    ttl_ms: i64,
    nx: bool,
) -> RespValue {
    // ttl of exactly zero acknowledges without storing
    if ttl_ms == 0 {
        return RespValue::ok();
    }

    if nx && live_value(kv, &key).is_some() {
        return RespValue::null_bulk_string();
    }

    let expires_at = if ttl_ms > 0 {
        Some(Instant::now() + std::time::Duration::from_millis(ttl_ms as u64))
    } else {
        None
    };

    kv.insert(key, Entry { value, expires_at });
    RespValue::ok()
}

fn handle_del(kv: &mut HashMap<String, Entry>, key: &str) -> RespValue {
    match live_value(kv, key) {
        Some(_) => {
            kv.remove(key);
            RespValue::integer(1)
        }
        None => RespValue::integer(0),
    }
}

fn handle_exists(kv: &mut HashMap<String, Entry>, key: &str) -> RespValue {
    match live_value(kv, key) {
        Some(_) => RespValue::integer(1),
        None => RespValue::integer(0),
    }
}

fn handle_type(kv: &mut HashMap<String, Entry>, key: &str) -> RespValue {
    match live_value(kv, key) {
        Some(_) => RespValue::simple_string("string"),
        None => RespValue::simple_string("none"),
    }
}
