use crate::command::{arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::server::ServerContext;

/// DEL key [key ...] — one shard command per key, integer replies summed.
pub async fn cmd_del(args: &[RespValue], ctx: &ServerContext) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("del");
    }

    let mut deleted = 0i64;
    for arg in args {
        let key = match arg_to_string(arg) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };
        if let RespValue::Integer(n) = ctx.store.del(&key).await {
            deleted += n;
        }
    }
    RespValue::integer(deleted)
}

/// EXISTS key [key ...] — a list with the name counts; otherwise the shard
/// answers for the string keyspace.
pub async fn cmd_exists(args: &[RespValue], ctx: &ServerContext) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("exists");
    }

    let mut found = 0i64;
    for arg in args {
        let key = match arg_to_string(arg) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };
        if ctx.lists.get(&key).await.is_some() {
            found += 1;
            continue;
        }
        if let RespValue::Integer(n) = ctx.store.exists(&key).await {
            found += n;
        }
    }
    RespValue::integer(found)
}

/// TYPE key — lists and streams are resolved here; the shard only ever
/// answers "string" or "none".
pub async fn cmd_type(args: &[RespValue], ctx: &ServerContext) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("type");
    }

    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };

    if ctx.lists.get(&key).await.is_some() {
        return RespValue::simple_string("list");
    }
    if ctx.streams.contains_key(&key).await {
        return RespValue::simple_string("stream");
    }
    ctx.store.key_type(&key).await
}
