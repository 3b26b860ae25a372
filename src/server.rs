use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command;
use crate::config::SharedConfig;
use crate::connection::ClientState;
use crate::pubsub::{PubSubReceiver, PubSubSender, SharedPubSub};
use crate::resp::{RespParser, RespValue};
use crate::store::ShardedStore;
use crate::types::list::ListStore;
use crate::types::stream::StreamStore;

/// Everything a command handler can reach: the sharded string store, the
/// list and stream engines, the pub/sub registry, and the configuration.
/// One of these is built per server and threaded through dispatch.
pub struct ServerContext {
    pub store: ShardedStore,
    pub lists: ListStore,
    pub streams: StreamStore,
    pub pubsub: SharedPubSub,
    pub config: SharedConfig,
}

impl ServerContext {
    pub fn new(config: SharedConfig) -> Self {
        ServerContext {
            store: ShardedStore::spawn(),
            lists: ListStore::new(),
            streams: StreamStore::new(),
            pubsub: SharedPubSub::default(),
            config,
        }
    }
}

pub async fn run_server(ctx: Arc<ServerContext>) -> std::io::Result<()> {
    let (bind, port) = {
        let cfg = ctx.config.read().await;
        (cfg.bind.clone(), cfg.port)
    };

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("shoal listening on {addr}");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = result?;
                debug!("new connection from {peer_addr}");

                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ctx).await {
                        debug!("connection error from {peer_addr}: {e}");
                    }
                    debug!("connection closed: {peer_addr}");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: Arc<ServerContext>) -> std::io::Result<()> {
    let mut client = ClientState::new();
    let mut buf = BytesMut::with_capacity(4096);

    // Push frames (pub/sub deliveries and extra subscribe confirmations)
    // funnel through this channel so this task stays the socket's only writer
    let (pubsub_tx, mut pubsub_rx): (PubSubSender, PubSubReceiver) = mpsc::unbounded_channel();

    loop {
        // Drain every complete command already buffered, one reply per command
        loop {
            match RespParser::parse(&mut buf) {
                Ok(Some(value)) => {
                    let response = process_command(value, &ctx, &mut client, &pubsub_tx).await;

                    if let Some(response) = response {
                        stream.write_all(&response.serialize()).await?;
                    }

                    if client.should_close {
                        cleanup_client(&ctx.pubsub, &client).await;
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Protocol errors answer once and drop the connection
                    let reply = RespValue::error(format!("ERR {e}"));
                    stream.write_all(&reply.serialize()).await?;
                    cleanup_client(&ctx.pubsub, &client).await;
                    return Ok(());
                }
            }
        }

        tokio::select! {
            result = stream.read_buf(&mut buf) => {
                match result {
                    Ok(0) => {
                        cleanup_client(&ctx.pubsub, &client).await;
                        return Ok(());
                    }
                    Ok(_) => {} // got data, loop back to parse
                    Err(e) => {
                        cleanup_client(&ctx.pubsub, &client).await;
                        return Err(e);
                    }
                }
            }
            Some(frame) = pubsub_rx.recv() => {
                stream.write_all(&frame.serialize()).await?;
            }
        }
    }
}

/// Returns None for input that produces no reply (an empty inline line).
async fn process_command(
    value: RespValue,
    ctx: &ServerContext,
    client: &mut ClientState,
    pubsub_tx: &PubSubSender,
) -> Option<RespValue> {
    let items = match value {
        RespValue::Array(Some(items)) => {
            if items.is_empty() {
                return None;
            }
            items
        }
        _ => return Some(RespValue::error("ERR invalid command format")),
    };

    let cmd_name = match items[0].to_string_lossy() {
        Some(name) => name.to_uppercase(),
        None => return Some(RespValue::error("ERR invalid command name")),
    };
    let args = &items[1..];

    if ctx.config.read().await.debug {
        let rendered: Vec<String> = items.iter().filter_map(|a| a.to_string_lossy()).collect();
        debug!(client = client.id, command = %rendered.join(" "), "dispatch");
    }

    // Subscribed mode narrows the command surface
    if client.in_subscribed_mode() {
        match cmd_name.as_str() {
            "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE" | "PING" | "QUIT"
            | "RESET" => {}
            _ => {
                return Some(RespValue::error(format!(
                    "ERR Can't execute '{}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context",
                    cmd_name.to_lowercase()
                )));
            }
        }
    }

    Some(command::dispatch(&cmd_name, args, ctx, client, pubsub_tx).await)
}

async fn cleanup_client(pubsub: &SharedPubSub, client: &ClientState) {
    let mut registry = pubsub.write().await;
    registry.unsubscribe_all(client.id);
}
