use crate::command::{arg_to_string, wrong_arg_count};
use crate::config::SharedConfig;
use crate::connection::ClientState;
use crate::glob::glob_match;
use crate::pubsub::SharedPubSub;
use crate::resp::RespValue;

/// PING, with the subscribed-mode shape: inside subscribed mode the reply
/// is ["pong", <message-or-empty>] instead of +PONG.
pub fn cmd_ping(args: &[RespValue], client: &ClientState) -> RespValue {
    if args.len() > 1 {
        return wrong_arg_count("ping");
    }

    if client.in_subscribed_mode() {
        let message = args
            .first()
            .and_then(|a| a.as_str())
            .map(|b| b.to_vec())
            .unwrap_or_default();
        return RespValue::array(vec![
            RespValue::bulk_string(b"pong".to_vec()),
            RespValue::bulk_string(message),
        ]);
    }

    match args.first() {
        None => RespValue::simple_string("PONG"),
        Some(arg) => match arg.as_str() {
            Some(message) => RespValue::bulk_string(message.to_vec()),
            None => RespValue::error("ERR invalid message"),
        },
    }
}

pub fn cmd_echo(args: &[RespValue]) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("echo");
    }
    match args[0].as_str() {
        Some(message) => RespValue::bulk_string(message.to_vec()),
        None => RespValue::error("ERR invalid message"),
    }
}

/// HELLO [protover] — RESP2 only; anything but 2 is refused.
pub fn cmd_hello(args: &[RespValue]) -> RespValue {
    let accepted = match args.first() {
        None => true,
        Some(arg) => arg_to_string(arg).as_deref() == Some("2"),
    };

    if !accepted {
        return RespValue::error("NOPROTO sorry this Redis does not support RESP3");
    }

    RespValue::array(vec![
        RespValue::bulk_string(b"server".to_vec()),
        RespValue::bulk_string(b"redis".to_vec()),
        RespValue::bulk_string(b"version".to_vec()),
        RespValue::bulk_string(b"7.0.0".to_vec()),
        RespValue::bulk_string(b"proto".to_vec()),
        RespValue::integer(2),
    ])
}

/// CLIENT SETNAME/GETNAME/SETINFO — everything else is acknowledged,
/// which keeps client libraries happy.
pub fn cmd_client(args: &[RespValue], client: &mut ClientState) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("client");
    }

    let subcommand = match arg_to_string(&args[0]) {
        Some(s) => s.to_uppercase(),
        None => return RespValue::error("ERR invalid subcommand"),
    };

    match subcommand.as_str() {
        "SETNAME" => {
            if let Some(name) = args.get(1).and_then(arg_to_string) {
                client.name = Some(name);
            }
            RespValue::ok()
        }
        "GETNAME" => match &client.name {
            Some(name) => RespValue::bulk_string(name.as_bytes().to_vec()),
            None => RespValue::null_bulk_string(),
        },
        "SETINFO" => RespValue::ok(),
        _ => RespValue::ok(),
    }
}

/// COMMAND — empty array, kept for redis-cli compatibility.
pub fn cmd_command() -> RespValue {
    RespValue::array(Vec::new())
}

pub fn cmd_quit(client: &mut ClientState) -> RespValue {
    client.should_close = true;
    RespValue::ok()
}

/// RESET — drop subscriptions and the connection name.
pub async fn cmd_reset(client: &mut ClientState, pubsub: &SharedPubSub) -> RespValue {
    if !client.channels.is_empty() {
        pubsub.write().await.unsubscribe_all(client.id);
        client.channels.clear();
    }
    client.name = None;
    RespValue::simple_string("RESET")
}

/// CONFIG GET pattern | CONFIG SET parameter value
pub async fn cmd_config(args: &[RespValue], config: &SharedConfig) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("config");
    }

    let subcommand = match arg_to_string(&args[0]) {
        Some(s) => s.to_uppercase(),
        None => return RespValue::error("ERR invalid subcommand"),
    };

    match subcommand.as_str() {
        "GET" => {
            if args.len() != 2 {
                return wrong_arg_count("config|get");
            }
            let Some(pattern) = arg_to_string(&args[1]) else {
                return RespValue::error("ERR invalid parameter");
            };

            let cfg = config.read().await;
            let mut reply = Vec::new();
            for (name, value) in cfg.parameters() {
                if glob_match(&pattern, name) {
                    reply.push(RespValue::bulk_string(name.as_bytes().to_vec()));
                    reply.push(RespValue::bulk_string(value.into_bytes()));
                }
            }
            RespValue::array(reply)
        }
        "SET" => {
            if args.len() != 3 {
                return wrong_arg_count("config|set");
            }
            let (Some(name), Some(value)) =
                (arg_to_string(&args[1]), arg_to_string(&args[2]))
            else {
                return RespValue::error("ERR invalid parameter");
            };

            let mut cfg = config.write().await;
            if cfg.set_parameter(&name, &value) {
                RespValue::ok()
            } else {
                RespValue::error(format!("ERR unknown configuration parameter '{name}'"))
            }
        }
        other => RespValue::error(format!(
            "ERR unknown subcommand '{other}'. Try CONFIG GET, CONFIG SET."
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pubsub::PubSubRegistry;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn bulk(s: &str) -> RespValue {
        RespValue::bulk_string(s.as_bytes().to_vec())
    }

    #[test]
    fn ping_plain_and_with_message() {
        let client = ClientState::new();
        assert_eq!(cmd_ping(&[], &client), RespValue::simple_string("PONG"));
        assert_eq!(cmd_ping(&[bulk("hey")], &client), bulk("hey"));
        assert_eq!(
            cmd_ping(&[bulk("a"), bulk("b")], &client),
            wrong_arg_count("ping")
        );
    }

    #[test]
    fn ping_in_subscribed_mode_is_an_array() {
        let mut client = ClientState::new();
        client.channels.insert("c".to_string());
        assert_eq!(
            cmd_ping(&[], &client),
            RespValue::array(vec![bulk("pong"), bulk("")])
        );
        assert_eq!(
            cmd_ping(&[bulk("hi")], &client),
            RespValue::array(vec![bulk("pong"), bulk("hi")])
        );
    }

    #[test]
    fn echo_requires_exactly_one_argument() {
        assert_eq!(cmd_echo(&[bulk("x")]), bulk("x"));
        assert_eq!(cmd_echo(&[]), wrong_arg_count("echo"));
    }

    #[test]
    fn hello_accepts_only_resp2() {
        let info = cmd_hello(&[]);
        assert!(matches!(info, RespValue::Array(Some(_))));
        assert_eq!(cmd_hello(&[bulk("2")]), info);
        assert_eq!(
            cmd_hello(&[bulk("3")]),
            RespValue::error("NOPROTO sorry this Redis does not support RESP3")
        );
    }

    #[test]
    fn client_name_round_trip() {
        let mut client = ClientState::new();
        assert_eq!(
            cmd_client(&[bulk("GETNAME")], &mut client),
            RespValue::null_bulk_string()
        );
        assert_eq!(
            cmd_client(&[bulk("SETNAME"), bulk("worker-1")], &mut client),
            RespValue::ok()
        );
        assert_eq!(
            cmd_client(&[bulk("GETNAME")], &mut client),
            bulk("worker-1")
        );
        assert_eq!(
            cmd_client(&[bulk("SETINFO"), bulk("lib-name"), bulk("x")], &mut client),
            RespValue::ok()
        );
    }

    #[tokio::test]
    async fn reset_clears_subscriptions_and_name() {
        let pubsub: SharedPubSub = Arc::new(RwLock::new(PubSubRegistry::new()));
        let mut client = ClientState::new();
        client.name = Some("n".to_string());
        client.channels.insert("c".to_string());

        assert_eq!(
            cmd_reset(&mut client, &pubsub).await,
            RespValue::simple_string("RESET")
        );
        assert!(client.channels.is_empty());
        assert!(client.name.is_none());
    }

    #[tokio::test]
    async fn config_get_matches_patterns() {
        let config: SharedConfig = Arc::new(RwLock::new(Config::default()));

        let reply = cmd_config(&[bulk("GET"), bulk("dir")], &config).await;
        assert_eq!(reply, RespValue::array(vec![bulk("dir"), bulk("/tmp")]));

        let reply = cmd_config(&[bulk("GET"), bulk("*")], &config).await;
        if let RespValue::Array(Some(items)) = reply {
            assert_eq!(items.len(), 4, "both parameters match '*'");
        } else {
            panic!("expected array");
        }
    }

    #[tokio::test]
    async fn config_set_rejects_unknown_parameters() {
        let config: SharedConfig = Arc::new(RwLock::new(Config::default()));

        assert_eq!(
            cmd_config(&[bulk("SET"), bulk("dir"), bulk("/data")], &config).await,
            RespValue::ok()
        );
        assert_eq!(config.read().await.dir, "/data");

        assert_eq!(
            cmd_config(&[bulk("SET"), bulk("maxmemory"), bulk("1")], &config).await,
            RespValue::error("ERR unknown configuration parameter 'maxmemory'")
        );
    }
}
