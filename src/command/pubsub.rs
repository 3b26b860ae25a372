use crate::command::{arg_to_bytes, arg_to_string, wrong_arg_count};
use crate::connection::ClientState;
use crate::pubsub::{message_frame, PubSubSender, SharedPubSub};
use crate::resp::RespValue;

fn confirmation(kind: &str, channel: &str, count: usize) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(kind.as_bytes().to_vec()),
        RespValue::bulk_string(channel.as_bytes().to_vec()),
        RespValue::integer(count as i64),
    ])
}

/// SUBSCRIBE channel [channel ...] — one confirmation per channel; the
/// first is the command reply, the rest ride the push channel so they
/// still arrive in order.
pub async fn cmd_subscribe(
    args: &[RespValue],
    client: &mut ClientState,
    pubsub: &SharedPubSub,
    pubsub_tx: &PubSubSender,
) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("subscribe");
    }

    let mut confirmations = Vec::with_capacity(args.len());
    {
        let mut registry = pubsub.write().await;
        for arg in args {
            let Some(channel) = arg_to_string(arg) else {
                return RespValue::error("ERR invalid channel");
            };
            client.channels.insert(channel.clone());
            registry.subscribe(client.id, &channel, pubsub_tx.clone());
            confirmations.push(confirmation("subscribe", &channel, client.channels.len()));
        }
    }

    let mut confirmations = confirmations.into_iter();
    let first = confirmations.next().unwrap_or_else(RespValue::ok);
    for extra in confirmations {
        let _ = pubsub_tx.send(extra);
    }
    first
}

/// UNSUBSCRIBE channel — the single-channel form; a no-op when the
/// connection was not subscribed.
pub async fn cmd_unsubscribe(
    args: &[RespValue],
    client: &mut ClientState,
    pubsub: &SharedPubSub,
) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("unsubscribe");
    }
    let Some(channel) = arg_to_string(&args[0]) else {
        return RespValue::error("ERR invalid channel");
    };

    client.channels.remove(&channel);
    pubsub.write().await.unsubscribe(client.id, &channel);

    confirmation("unsubscribe", &channel, client.channels.len())
}

/// PUBLISH channel message — replies with the subscriber count from the
/// snapshot; delivery happens through each subscriber's connection
/// channel, off this handler's critical section.
pub async fn cmd_publish(args: &[RespValue], pubsub: &SharedPubSub) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("publish");
    }
    let Some(channel) = arg_to_string(&args[0]) else {
        return RespValue::error("ERR invalid channel");
    };
    let Some(payload) = arg_to_bytes(&args[1]).map(|b| b.to_vec()) else {
        return RespValue::error("ERR invalid message");
    };

    let subscribers = {
        let registry = pubsub.read().await;
        registry.subscribers(&channel)
    };
    let count = subscribers.len();

    for sender in subscribers {
        let _ = sender.send(message_frame(&channel, &payload));
    }

    RespValue::integer(count as i64)
}
