use crate::command::{arg_to_bytes, arg_to_i64, arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::ShardedStore;

/// SET key value [EX seconds | PX milliseconds] [NX]
pub async fn cmd_set(args: &[RespValue], store: &ShardedStore) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("set");
    }

    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let value = match arg_to_bytes(&args[1]) {
        Some(v) => v.to_vec(),
        None => return RespValue::error("ERR invalid value"),
    };

    let mut ttl_ms: i64 = -1; // no expiry unless EX/PX says otherwise
    let mut nx = false;

    let mut i = 2;
    while i < args.len() {
        let opt = match arg_to_string(&args[i]) {
            Some(o) => o.to_uppercase(),
            None => return RespValue::error("ERR syntax error"),
        };
        match opt.as_str() {
            "NX" => {
                nx = true;
                i += 1;
            }
            "EX" | "PX" => {
                if i + 1 >= args.len() {
                    return RespValue::error("ERR syntax error");
                }
                let raw = match arg_to_i64(&args[i + 1]) {
                    Some(n) => n,
                    None => {
                        return RespValue::error("ERR value is not an integer or out of range")
                    }
                };
                ttl_ms = if opt == "EX" { raw.saturating_mul(1000) } else { raw };
                i += 2;
            }
            _ => return RespValue::error("ERR syntax error"),
        }
    }

    store.set(&key, value, ttl_ms, nx).await
}

/// SETNX key value — SET NX with no expiry, reported as 1/0.
pub async fn cmd_setnx(args: &[RespValue], store: &ShardedStore) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("setnx");
    }

    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let value = match arg_to_bytes(&args[1]) {
        Some(v) => v.to_vec(),
        None => return RespValue::error("ERR invalid value"),
    };

    match store.set(&key, value, -1, true).await {
        RespValue::SimpleString(_) => RespValue::integer(1),
        _ => RespValue::integer(0),
    }
}

pub async fn cmd_get(args: &[RespValue], store: &ShardedStore) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("get");
    }

    match arg_to_string(&args[0]) {
        Some(key) => store.get(&key).await,
        None => RespValue::error("ERR invalid key"),
    }
}
