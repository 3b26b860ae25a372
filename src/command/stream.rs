use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::command::{arg_to_bytes, arg_to_i64, arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::types::stream::{
    now_unix_ms, parse_range_id, IdSpec, Stream, StreamEntry, StreamId, StreamListener,
    StreamStore,
};

fn entry_to_resp(entry: &StreamEntry) -> RespValue {
    let mut pairs = Vec::with_capacity(entry.fields.len() * 2);
    for (name, value) in &entry.fields {
        pairs.push(RespValue::bulk_string(name.clone()));
        pairs.push(RespValue::bulk_string(value.clone()));
    }
    RespValue::array(vec![
        RespValue::bulk_string(entry.id.to_string().into_bytes()),
        RespValue::array(pairs),
    ])
}

/// XADD key id field value [field value ...]
pub async fn cmd_xadd(args: &[RespValue], streams: &StreamStore) -> RespValue {
    if args.len() < 4 {
        return wrong_arg_count("xadd");
    }

    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let spec = match arg_to_string(&args[1]).as_deref().map(IdSpec::parse) {
        Some(Ok(spec)) => spec,
        _ => return RespValue::error("ERR Invalid stream ID specified as stream command argument"),
    };

    let raw_fields = &args[2..];
    if raw_fields.len() % 2 != 0 {
        return wrong_arg_count("xadd");
    }
    let mut fields = Vec::with_capacity(raw_fields.len() / 2);
    for pair in raw_fields.chunks(2) {
        match (arg_to_bytes(&pair[0]), arg_to_bytes(&pair[1])) {
            (Some(name), Some(value)) => fields.push((name.to_vec(), value.to_vec())),
            _ => return RespValue::error("ERR invalid field or value"),
        }
    }

    let mut map = streams.lock().await;

    // Resolve and validate before touching the map so a rejected id never
    // materializes an empty stream.
    let id = match map.get(&key) {
        Some(stream) => stream.resolve_id(spec, now_unix_ms()),
        None => Stream::new().resolve_id(spec, now_unix_ms()),
    };

    if id.is_zero() {
        return RespValue::error("ERR The ID specified in XADD must be greater than 0-0");
    }
    if map
        .get(&key)
        .and_then(Stream::last_id)
        .is_some_and(|last| id <= last)
    {
        return RespValue::error(
            "ERR The ID specified in XADD is equal or smaller than the target stream top item",
        );
    }

    let stream = map.entry(key).or_insert_with(Stream::new);
    stream.insert(StreamEntry { id, fields });
    stream.notify_listeners(id);

    RespValue::bulk_string(id.to_string().into_bytes())
}

/// XRANGE key start end
pub async fn cmd_xrange(args: &[RespValue], streams: &StreamStore) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("xrange");
    }

    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let start = match arg_to_string(&args[1]).as_deref().map(|s| parse_range_id(s, false)) {
        Some(Ok(id)) => id,
        _ => return RespValue::error("ERR Invalid stream ID specified as stream command argument"),
    };
    let end = match arg_to_string(&args[2]).as_deref().map(|s| parse_range_id(s, true)) {
        Some(Ok(id)) => id,
        _ => return RespValue::error("ERR Invalid stream ID specified as stream command argument"),
    };

    let map = streams.lock().await;
    let Some(stream) = map.get(&key) else {
        return RespValue::array(Vec::new());
    };

    let entries = stream.range(start, end);
    RespValue::array(entries.iter().map(entry_to_resp).collect())
}

/// XREAD [COUNT n] [BLOCK ms] STREAMS key [key ...] id [id ...]
///
/// COUNT is accepted for client compatibility but not applied. An id of
/// `$` resolves to the stream's current last id, so only entries appended
/// after this call can satisfy it.
pub async fn cmd_xread(args: &[RespValue], streams: &StreamStore) -> RespValue {
    let mut block_ms: i64 = -1;
    let mut streams_at: Option<usize> = None;

    let mut i = 0;
    while i < args.len() {
        let Some(word) = arg_to_string(&args[i]) else {
            return RespValue::error("ERR syntax error");
        };
        match word.to_uppercase().as_str() {
            "STREAMS" => {
                streams_at = Some(i);
                break;
            }
            "BLOCK" => {
                let Some(ms) = args.get(i + 1).and_then(arg_to_i64) else {
                    return RespValue::error("ERR value is not an integer or out of range");
                };
                block_ms = ms;
                i += 2;
            }
            "COUNT" => {
                // parsed for compatibility, intentionally not enforced
                if args.get(i + 1).and_then(arg_to_i64).is_none() {
                    return RespValue::error("ERR value is not an integer or out of range");
                }
                i += 2;
            }
            _ => return RespValue::error("ERR syntax error"),
        }
    }

    let Some(streams_at) = streams_at else {
        return RespValue::error("ERR syntax error");
    };
    let tail = &args[streams_at + 1..];
    if tail.is_empty() || tail.len() % 2 != 0 {
        return RespValue::error("ERR syntax error");
    }
    let stream_count = tail.len() / 2;

    let mut keys = Vec::with_capacity(stream_count);
    for arg in &tail[..stream_count] {
        match arg_to_string(arg) {
            Some(k) => keys.push(k),
            None => return RespValue::error("ERR syntax error"),
        }
    }

    let mut map = streams.lock().await;

    // Resolve ids; `$` needs the stream's current last entry
    let mut cursors: Vec<StreamId> = Vec::with_capacity(stream_count);
    for arg in &tail[stream_count..] {
        let Some(raw) = arg_to_string(arg) else {
            return RespValue::error("ERR syntax error");
        };
        if raw == "$" {
            let last = keys
                .get(cursors.len())
                .and_then(|key| map.get(key))
                .and_then(Stream::last_id)
                .unwrap_or(StreamId::MIN);
            cursors.push(last);
        } else {
            match IdSpec::parse(&raw) {
                Ok(spec) => cursors.push(spec.as_read_position()),
                Err(_) => {
                    return RespValue::error(
                        "ERR Invalid stream ID specified as stream command argument",
                    )
                }
            }
        }
    }

    if let Some(reply) = snapshot(&map, &keys, &cursors) {
        return reply;
    }
    if block_ms < 0 {
        return RespValue::null_array();
    }

    // Block: register a listener on every requested stream, creating the
    // missing ones so a future XADD has somewhere to find us.
    let (wake_tx, mut wake_rx) = mpsc::channel::<usize>(stream_count);
    let mut listeners = Vec::with_capacity(stream_count);
    for (slot, key) in keys.iter().enumerate() {
        let stream = map.entry(key.clone()).or_insert_with(Stream::new);
        let listener = Arc::new(StreamListener::new(slot, cursors[slot], wake_tx.clone()));
        stream.add_listener(listener.clone());
        listeners.push(listener);
    }
    drop(wake_tx);
    drop(map);

    let woken = if block_ms == 0 {
        wake_rx.recv().await.is_some()
    } else {
        tokio::select! {
            fired = wake_rx.recv() => fired.is_some(),
            _ = tokio::time::sleep(Duration::from_millis(block_ms as u64)) => false,
        }
    };

    let mut map = streams.lock().await;
    for (slot, key) in keys.iter().enumerate() {
        if let Some(stream) = map.get_mut(key) {
            stream.remove_listener(&listeners[slot]);
        }
    }

    if !woken {
        return RespValue::null_array();
    }
    snapshot(&map, &keys, &cursors).unwrap_or_else(RespValue::null_array)
}

/// Collect entries strictly after each cursor. None when every stream is
/// empty past its cursor.
fn snapshot(
    map: &std::collections::HashMap<String, Stream>,
    keys: &[String],
    cursors: &[StreamId],
) -> Option<RespValue> {
    let mut replies = Vec::new();
    for (key, &cursor) in keys.iter().zip(cursors) {
        let Some(stream) = map.get(key) else {
            continue;
        };
        let entries = stream.entries_after(cursor);
        if entries.is_empty() {
            continue;
        }
        replies.push(RespValue::array(vec![
            RespValue::bulk_string(key.as_bytes().to_vec()),
            RespValue::array(entries.iter().map(entry_to_resp).collect()),
        ]));
    }

    if replies.is_empty() {
        None
    } else {
        Some(RespValue::array(replies))
    }
}
