use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::resp::RespValue;

pub type PubSubSender = mpsc::UnboundedSender<RespValue>;
pub type PubSubReceiver = mpsc::UnboundedReceiver<RespValue>;

/// Channel-subscription registry. Each subscribed client is reachable
/// through the unbounded sender feeding its connection task, which is the
/// only writer on that socket — publishing never blocks on a slow peer.
#[derive(Debug, Default)]
pub struct PubSubRegistry {
    /// channel name -> subscribed client ids
    channels: HashMap<String, HashSet<u64>>,
    /// client id -> sender for pushing messages to the client's connection
    senders: HashMap<u64, PubSubSender>,
    /// client id -> channels it is subscribed to (for disconnect cleanup)
    client_channels: HashMap<u64, HashSet<String>>,
}

impl PubSubRegistry {
    pub fn new() -> Self {
        PubSubRegistry::default()
    }

    pub fn subscribe(&mut self, client_id: u64, channel: &str, sender: PubSubSender) {
        self.senders.entry(client_id).or_insert(sender);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(client_id);
        self.client_channels
            .entry(client_id)
            .or_default()
            .insert(channel.to_string());
    }

    pub fn unsubscribe(&mut self, client_id: u64, channel: &str) {
        if let Some(clients) = self.channels.get_mut(channel) {
            clients.remove(&client_id);
            if clients.is_empty() {
                self.channels.remove(channel);
            }
        }
        let mut gone = false;
        if let Some(chans) = self.client_channels.get_mut(&client_id) {
            chans.remove(channel);
            gone = chans.is_empty();
        }
        if gone {
            self.client_channels.remove(&client_id);
            self.senders.remove(&client_id);
        }
    }

    /// Snapshot the subscriber senders for a channel.
    pub fn subscribers(&self, channel: &str) -> Vec<PubSubSender> {
        match self.channels.get(channel) {
            Some(client_ids) => client_ids
                .iter()
                .filter_map(|id| self.senders.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove every subscription a client holds (called on disconnect).
    pub fn unsubscribe_all(&mut self, client_id: u64) {
        if let Some(chans) = self.client_channels.remove(&client_id) {
            for channel in chans {
                if let Some(clients) = self.channels.get_mut(&channel) {
                    clients.remove(&client_id);
                    if clients.is_empty() {
                        self.channels.remove(&channel);
                    }
                }
            }
        }
        self.senders.remove(&client_id);
    }
}

pub type SharedPubSub = Arc<RwLock<PubSubRegistry>>;

/// Build the ["message", channel, payload] push frame.
pub fn message_frame(channel: &str, payload: &[u8]) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(b"message".to_vec()),
        RespValue::bulk_string(channel.as_bytes().to_vec()),
        RespValue::bulk_string(payload.to_vec()),
    ])
}
