pub mod shard;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::resp::RespValue;
use shard::ShardCommand;

/// Number of partitions of the string key space. Must be a power of two.
pub const SHARD_COUNT: usize = 16;

/// Bound on each shard's inbox; a full inbox blocks the submitting
/// connection task, which throttles pathological clients.
const INBOX_CAPACITY: usize = 4096;

/// How often each shard is asked to sweep expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// FNV-1a over the key bytes, masked down to a shard index.
fn shard_for_key(key: &str) -> usize {
    const OFFSET: u32 = 2166136261;
    const PRIME: u32 = 16777619;

    let mut hash = OFFSET;
    for &byte in key.as_bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }

    (hash & (SHARD_COUNT as u32 - 1)) as usize
}

/// The sharded string store. Each shard is a spawned task owning a private
/// map; this front end routes requests to the right inbox and awaits the
/// oneshot reply.
pub struct ShardedStore {
    inboxes: Vec<mpsc::Sender<ShardCommand>>,
}

impl ShardedStore {
    /// Spawn the shard executors and their expiry sweepers.
    pub fn spawn() -> Self {
        info!(shards = SHARD_COUNT, "spawning key/value shards");

        let mut inboxes = Vec::with_capacity(SHARD_COUNT);
        for index in 0..SHARD_COUNT {
            let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
            tokio::spawn(shard::run(index, rx));

            let sweeper_tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(SWEEP_INTERVAL).await;
                    // sweeping on the executor itself keeps the map single-owner
                    if sweeper_tx.send(ShardCommand::Cleanup).await.is_err() {
                        return;
                    }
                }
            });

            inboxes.push(tx);
        }

        ShardedStore { inboxes }
    }

    async fn submit(
        &self,
        key: &str,
        build: impl FnOnce(oneshot::Sender<RespValue>) -> ShardCommand,
    ) -> RespValue {
        let (reply_tx, reply_rx) = oneshot::channel();
        let inbox = &self.inboxes[shard_for_key(key)];

        if inbox.send(build(reply_tx)).await.is_err() {
            return RespValue::error("ERR shard unavailable");
        }
        match reply_rx.await {
            Ok(reply) => reply,
            Err(_) => RespValue::error("ERR shard dropped the request"),
        }
    }

    pub async fn get(&self, key: &str) -> RespValue {
        self.submit(key, |reply| ShardCommand::Get {
            key: key.to_string(),
            reply,
        })
        .await
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_ms: i64, nx: bool) -> RespValue {
        self.submit(key, |reply| ShardCommand::Set {
            key: key.to_string(),
            value,
            ttl_ms,
            nx,
            reply,
        })
        .await
    }

    pub async fn del(&self, key: &str) -> RespValue {
        self.submit(key, |reply| ShardCommand::Del {
            key: key.to_string(),
            reply,
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> RespValue {
        self.submit(key, |reply| ShardCommand::Exists {
            key: key.to_string(),
            reply,
        })
        .await
    }

    pub async fn key_type(&self, key: &str) -> RespValue {
        self.submit(key, |reply| ShardCommand::Type {
            key: key.to_string(),
            reply,
        })
        .await
    }
}
