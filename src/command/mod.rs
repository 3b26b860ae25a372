pub mod key;
pub mod list;
pub mod pubsub;
pub mod server_cmd;
pub mod stream;
pub mod string;

use crate::connection::ClientState;
use crate::pubsub::PubSubSender;
use crate::resp::RespValue;
use crate::server::ServerContext;

/// Dispatch a parsed command to the appropriate handler.
pub async fn dispatch(
    cmd_name: &str,
    args: &[RespValue],
    ctx: &ServerContext,
    client: &mut ClientState,
    pubsub_tx: &PubSubSender,
) -> RespValue {
    match cmd_name {
        // Connection
        "PING" => server_cmd::cmd_ping(args, client),
        "ECHO" => server_cmd::cmd_echo(args),
        "HELLO" => server_cmd::cmd_hello(args),
        "CLIENT" => server_cmd::cmd_client(args, client),
        "COMMAND" => server_cmd::cmd_command(),
        "QUIT" => server_cmd::cmd_quit(client),
        "RESET" => server_cmd::cmd_reset(client, &ctx.pubsub).await,
        "CONFIG" => server_cmd::cmd_config(args, &ctx.config).await,

        // Strings
        "SET" => string::cmd_set(args, &ctx.store).await,
        "SETNX" => string::cmd_setnx(args, &ctx.store).await,
        "GET" => string::cmd_get(args, &ctx.store).await,

        // Keys
        "DEL" => key::cmd_del(args, ctx).await,
        "EXISTS" => key::cmd_exists(args, ctx).await,
        "TYPE" => key::cmd_type(args, ctx).await,

        // Lists
        "RPUSH" => list::cmd_rpush(args, &ctx.lists).await,
        "LPUSH" => list::cmd_lpush(args, &ctx.lists).await,
        "LPOP" => list::cmd_lpop(args, &ctx.lists).await,
        "LLEN" => list::cmd_llen(args, &ctx.lists).await,
        "LRANGE" => list::cmd_lrange(args, &ctx.lists).await,
        "BLPOP" => list::cmd_blpop(args, &ctx.lists).await,

        // Streams
        "XADD" => stream::cmd_xadd(args, &ctx.streams).await,
        "XRANGE" => stream::cmd_xrange(args, &ctx.streams).await,
        "XREAD" => stream::cmd_xread(args, &ctx.streams).await,

        // Pub/sub
        "SUBSCRIBE" => pubsub::cmd_subscribe(args, client, &ctx.pubsub, pubsub_tx).await,
        "UNSUBSCRIBE" => pubsub::cmd_unsubscribe(args, client, &ctx.pubsub).await,
        "PUBLISH" => pubsub::cmd_publish(args, &ctx.pubsub).await,

        _ => {
            let args_preview: Vec<String> = args
                .iter()
                .take(3)
                .filter_map(|a| a.to_string_lossy())
                .map(|s| format!("'{s}'"))
                .collect();
            RespValue::error(format!(
                "ERR unknown command '{}', with args beginning with: {}",
                cmd_name,
                args_preview.join(" ")
            ))
        }
    }
}

/// Extract raw string bytes from a command argument.
pub fn arg_to_bytes(arg: &RespValue) -> Option<&[u8]> {
    arg.as_str()
}

/// Extract a UTF-8 string from a command argument.
pub fn arg_to_string(arg: &RespValue) -> Option<String> {
    arg.to_string_lossy()
}

/// Extract an i64 from a command argument.
pub fn arg_to_i64(arg: &RespValue) -> Option<i64> {
    arg.to_string_lossy()?.parse().ok()
}

/// Return a wrong number of arguments error.
pub fn wrong_arg_count(cmd: &str) -> RespValue {
    RespValue::error(format!("ERR wrong number of arguments for '{cmd}' command"))
}
