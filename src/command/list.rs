use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::command::{arg_to_bytes, arg_to_i64, arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::types::list::{BlockingList, ListStore, PopWaiter, PushSide};

fn key_value_reply(key: &str, value: Vec<u8>) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(key.as_bytes().to_vec()),
        RespValue::bulk_string(value),
    ])
}

async fn push(args: &[RespValue], lists: &ListStore, side: PushSide, cmd: &str) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count(cmd);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };

    let mut values = Vec::with_capacity(args.len() - 1);
    for arg in &args[1..] {
        match arg_to_bytes(arg) {
            Some(v) => values.push(v.to_vec()),
            None => return RespValue::error("ERR invalid value"),
        }
    }

    let list = lists.create_or_get(&key).await;
    let len = list.push(side, values).await;
    RespValue::integer(len as i64)
}

pub async fn cmd_rpush(args: &[RespValue], lists: &ListStore) -> RespValue {
    push(args, lists, PushSide::Back, "rpush").await
}

pub async fn cmd_lpush(args: &[RespValue], lists: &ListStore) -> RespValue {
    push(args, lists, PushSide::Front, "lpush").await
}

/// LPOP key [count] — bulk string without a count, array with one.
pub async fn cmd_lpop(args: &[RespValue], lists: &ListStore) -> RespValue {
    if args.is_empty() || args.len() > 2 {
        return wrong_arg_count("lpop");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };

    let count = if args.len() == 2 {
        match arg_to_i64(&args[1]) {
            Some(n) if n >= 0 => Some(n as usize),
            _ => return RespValue::error("ERR value is not an integer or out of range"),
        }
    } else {
        None
    };

    let Some(list) = lists.get(&key).await else {
        return RespValue::null_bulk_string();
    };

    let reply = match count {
        Some(n) => {
            let values = list.pop_front_count(n).await;
            RespValue::array(values.into_iter().map(RespValue::bulk_string).collect())
        }
        None => match list.pop_front().await {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null_bulk_string(),
        },
    };

    lists.remove_if_unused(&key).await;
    reply
}

pub async fn cmd_llen(args: &[RespValue], lists: &ListStore) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("llen");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };

    match lists.get(&key).await {
        Some(list) => RespValue::integer(list.len().await as i64),
        None => RespValue::integer(0),
    }
}

pub async fn cmd_lrange(args: &[RespValue], lists: &ListStore) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("lrange");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let start = match arg_to_i64(&args[1]) {
        Some(n) => n,
        None => return RespValue::error("ERR value is not an integer or out of range"),
    };
    let stop = match arg_to_i64(&args[2]) {
        Some(n) => n,
        None => return RespValue::error("ERR value is not an integer or out of range"),
    };

    match lists.get(&key).await {
        Some(list) => {
            let values = list.range(start, stop).await;
            RespValue::array(values.into_iter().map(RespValue::bulk_string).collect())
        }
        None => RespValue::array(Vec::new()),
    }
}

/// BLPOP key [key ...] timeout
///
/// Runs in four phases: an immediate pass over the keys, registration of
/// one waiter per key (all sharing a wake channel tagged by key slot), a
/// wait on that channel against the optional timeout, then resolution.
/// The timeout path must re-check each registration: a removal that fails
/// means a producer already dequeued the waiter and published an element,
/// and that element must be served, not dropped.
pub async fn cmd_blpop(args: &[RespValue], lists: &ListStore) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("blpop");
    }

    let mut keys = Vec::with_capacity(args.len() - 1);
    for arg in &args[..args.len() - 1] {
        match arg_to_string(arg) {
            Some(k) => keys.push(k),
            None => return RespValue::error("ERR invalid key"),
        }
    }

    let timeout_secs: f64 = match arg_to_string(&args[args.len() - 1])
        .and_then(|s| s.parse().ok())
    {
        Some(t) if t >= 0.0 => t,
        _ => return RespValue::error("ERR timeout is not a float or out of range"),
    };

    // Phase 1: serve from the first key that already has data
    for key in &keys {
        if let Some(list) = lists.get(key).await {
            if let Some(value) = list.pop_front().await {
                lists.remove_if_unused(key).await;
                return key_value_reply(key, value);
            }
        }
    }

    // Phase 2: register one waiter per key on a shared wake channel
    let (wake_tx, mut wake_rx) = mpsc::channel::<usize>(keys.len());
    let mut registered: Vec<(String, Arc<BlockingList>)> = Vec::with_capacity(keys.len());
    let mut waiters: Vec<Arc<PopWaiter>> = Vec::with_capacity(keys.len());

    for (slot, key) in keys.iter().enumerate() {
        let list = lists.create_or_get(key).await;
        let waiter = Arc::new(PopWaiter::new(slot, wake_tx.clone()));
        list.register_waiter(waiter.clone()).await;
        registered.push((key.clone(), list));
        waiters.push(waiter);
    }
    drop(wake_tx);

    // Phase 3: wait for a producer or the clock
    let fired = if timeout_secs == 0.0 {
        wake_rx.recv().await
    } else {
        tokio::select! {
            fired = wake_rx.recv() => fired,
            _ = tokio::time::sleep(Duration::from_secs_f64(timeout_secs)) => None,
        }
    };

    // Phase 4: resolve
    match fired {
        Some(slot) => {
            for (i, (_, list)) in registered.iter().enumerate() {
                if i != slot {
                    list.remove_waiter(&waiters[i]).await;
                }
            }
            let (key, list) = &registered[slot];
            serve_signalled_pop(lists, key, list).await
        }
        None => {
            for (i, (key, list)) in registered.iter().enumerate() {
                if !list.remove_waiter(&waiters[i]).await {
                    // A producer consumed this waiter before the deadline;
                    // honor its element after withdrawing the rest.
                    for (j, (_, other)) in registered.iter().enumerate().skip(i + 1) {
                        other.remove_waiter(&waiters[j]).await;
                    }
                    return serve_signalled_pop(lists, key, list).await;
                }
            }
            RespValue::null_array()
        }
    }
}

/// Pop on behalf of a waiter that a producer signalled. The producer
/// published the element before dequeuing the waiter, so an empty deque
/// here means another client raced the reserved element away.
async fn serve_signalled_pop(lists: &ListStore, key: &str, list: &BlockingList) -> RespValue {
    match list.pop_front().await {
        Some(value) => {
            lists.remove_if_unused(key).await;
            key_value_reply(key, value)
        }
        None => {
            warn!(key, "blpop woke to an empty list");
            RespValue::error("ERR unexpectedly found an empty list after wakeup")
        }
    }
}
