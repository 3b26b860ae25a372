mod support;

use redis::Commands;
use support::{connect, connect_raw, start_server, wait_for_startup};

#[tokio::test]
async fn test_ping_and_echo() {
    let port = 18300;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let result: String = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(result, "PONG");

        let result: String = redis::cmd("PING").arg("hey").query(&mut conn).unwrap();
        assert_eq!(result, "hey");

        let result: String = redis::cmd("ECHO").arg("hello world").query(&mut conn).unwrap();
        assert_eq!(result, "hello world");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_set_get() {
    let port = 18301;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: () = conn.set("mykey", "myvalue").unwrap();
        let val: String = conn.get("mykey").unwrap();
        assert_eq!(val, "myvalue");

        let missing: Option<String> = conn.get("absent").unwrap();
        assert_eq!(missing, None);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_set_px_expires() {
    let port = 18302;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let ok: String = redis::cmd("SET")
            .arg("k")
            .arg("v")
            .arg("PX")
            .arg(100)
            .query(&mut conn)
            .unwrap();
        assert_eq!(ok, "OK");

        let val: Option<String> = conn.get("k").unwrap();
        assert_eq!(val.as_deref(), Some("v"));

        std::thread::sleep(std::time::Duration::from_millis(200));
        let val: Option<String> = conn.get("k").unwrap();
        assert_eq!(val, None);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_set_nx_and_setnx() {
    let port = 18303;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let first: Option<String> = redis::cmd("SET")
            .arg("k")
            .arg("a")
            .arg("NX")
            .query(&mut conn)
            .unwrap();
        assert_eq!(first.as_deref(), Some("OK"));

        let second: Option<String> = redis::cmd("SET")
            .arg("k")
            .arg("b")
            .arg("NX")
            .query(&mut conn)
            .unwrap();
        assert_eq!(second, None);

        let set: i64 = redis::cmd("SETNX").arg("other").arg("x").query(&mut conn).unwrap();
        assert_eq!(set, 1);
        let set: i64 = redis::cmd("SETNX").arg("other").arg("y").query(&mut conn).unwrap();
        assert_eq!(set, 0);

        let val: String = conn.get("k").unwrap();
        assert_eq!(val, "a");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_del_and_exists_multi_key() {
    let port = 18304;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: () = conn.set("a", "1").unwrap();
        let _: () = conn.set("b", "2").unwrap();

        let found: i64 = redis::cmd("EXISTS")
            .arg("a")
            .arg("b")
            .arg("missing")
            .query(&mut conn)
            .unwrap();
        assert_eq!(found, 2);

        let deleted: i64 = redis::cmd("DEL")
            .arg("a")
            .arg("b")
            .arg("missing")
            .query(&mut conn)
            .unwrap();
        assert_eq!(deleted, 2);

        let found: i64 = redis::cmd("EXISTS").arg("a").query(&mut conn).unwrap();
        assert_eq!(found, 0);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_type_reports_each_keyspace() {
    let port = 18305;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: () = conn.set("str", "v").unwrap();
        let _: i64 = conn.rpush("lst", "v").unwrap();
        let _: String = redis::cmd("XADD")
            .arg("stm")
            .arg("1-1")
            .arg("f")
            .arg("v")
            .query(&mut conn)
            .unwrap();

        let t: String = redis::cmd("TYPE").arg("str").query(&mut conn).unwrap();
        assert_eq!(t, "string");
        let t: String = redis::cmd("TYPE").arg("lst").query(&mut conn).unwrap();
        assert_eq!(t, "list");
        let t: String = redis::cmd("TYPE").arg("stm").query(&mut conn).unwrap();
        assert_eq!(t, "stream");
        let t: String = redis::cmd("TYPE").arg("nothing").query(&mut conn).unwrap();
        assert_eq!(t, "none");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_list_push_pop_range() {
    let port = 18306;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let len: i64 = conn.rpush("L", &["a", "b"]).unwrap();
        assert_eq!(len, 2);
        let len: i64 = conn.lpush("L", "z").unwrap();
        assert_eq!(len, 3);

        let all: Vec<String> = conn.lrange("L", 0, -1).unwrap();
        assert_eq!(all, vec!["z", "a", "b"]);

        let len: i64 = conn.llen("L").unwrap();
        assert_eq!(len, 3);

        let head: Option<String> = conn.lpop("L", None).unwrap();
        assert_eq!(head.as_deref(), Some("z"));

        let rest: Vec<String> = redis::cmd("LPOP").arg("L").arg(5).query(&mut conn).unwrap();
        assert_eq!(rest, vec!["a", "b"]);

        // the drained list is gone from every observer
        let len: i64 = conn.llen("L").unwrap();
        assert_eq!(len, 0);
        let t: String = redis::cmd("TYPE").arg("L").query(&mut conn).unwrap();
        assert_eq!(t, "none");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_blpop_wakes_on_push() {
    let port = 18307;
    let _server = start_server(port);
    wait_for_startup().await;

    let waiter = tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);
        let reply: (String, String) = redis::cmd("BLPOP")
            .arg("jobs")
            .arg(0)
            .query(&mut conn)
            .unwrap();
        reply
    });

    tokio::task::spawn_blocking(move || {
        std::thread::sleep(std::time::Duration::from_millis(300));
        let mut conn = connect(port);
        let len: i64 = conn.rpush("jobs", "x").unwrap();
        assert_eq!(len, 1);
    })
    .await
    .unwrap();

    let (key, value) = waiter.await.unwrap();
    assert_eq!(key, "jobs");
    assert_eq!(value, "x");
}

#[tokio::test]
async fn test_blpop_timeout_returns_nil_and_keeps_elements() {
    let port = 18308;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let reply: Option<(String, String)> = redis::cmd("BLPOP")
            .arg("empty")
            .arg(0.2)
            .query(&mut conn)
            .unwrap();
        assert_eq!(reply, None);

        // a push after the timeout keeps its element
        let _: i64 = conn.rpush("empty", "kept").unwrap();
        let len: i64 = conn.llen("empty").unwrap();
        assert_eq!(len, 1);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_blpop_multi_key_serves_first_ready() {
    let port = 18309;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: i64 = conn.rpush("second", "v").unwrap();
        let reply: (String, String) = redis::cmd("BLPOP")
            .arg("first")
            .arg("second")
            .arg(0)
            .query(&mut conn)
            .unwrap();
        assert_eq!(reply, ("second".to_string(), "v".to_string()));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_xadd_xrange() {
    let port = 18310;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let id: String = redis::cmd("XADD")
            .arg("s")
            .arg("1-1")
            .arg("temp")
            .arg("20")
            .query(&mut conn)
            .unwrap();
        assert_eq!(id, "1-1");

        let id: String = redis::cmd("XADD")
            .arg("s")
            .arg("1-*")
            .arg("temp")
            .arg("21")
            .query(&mut conn)
            .unwrap();
        assert_eq!(id, "1-2");

        let entries: Vec<(String, Vec<String>)> = redis::cmd("XRANGE")
            .arg("s")
            .arg("-")
            .arg("+")
            .query(&mut conn)
            .unwrap();
        assert_eq!(
            entries,
            vec![
                ("1-1".to_string(), vec!["temp".to_string(), "20".to_string()]),
                ("1-2".to_string(), vec!["temp".to_string(), "21".to_string()]),
            ]
        );

        let entries: Vec<(String, Vec<String>)> = redis::cmd("XRANGE")
            .arg("s")
            .arg("1-2")
            .arg("+")
            .query(&mut conn)
            .unwrap();
        assert_eq!(entries.len(), 1);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_xadd_rejects_stale_and_zero_ids() {
    let port = 18311;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: String = redis::cmd("XADD")
            .arg("s")
            .arg("1-1")
            .arg("a")
            .arg("1")
            .query(&mut conn)
            .unwrap();

        let err = redis::cmd("XADD")
            .arg("s")
            .arg("1-1")
            .arg("b")
            .arg("2")
            .query::<String>(&mut conn)
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("equal or smaller than the target stream top item"));

        let err = redis::cmd("XADD")
            .arg("z")
            .arg("0-0")
            .arg("a")
            .arg("1")
            .query::<String>(&mut conn)
            .unwrap_err();
        assert!(err.to_string().contains("must be greater than 0-0"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_xread_snapshot_and_block() {
    let port = 18312;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);
        let _: String = redis::cmd("XADD")
            .arg("s")
            .arg("1-1")
            .arg("a")
            .arg("1")
            .query(&mut conn)
            .unwrap();

        // snapshot: strictly-after semantics
        let reply: Vec<(String, Vec<(String, Vec<String>)>)> = redis::cmd("XREAD")
            .arg("STREAMS")
            .arg("s")
            .arg("0-0")
            .query(&mut conn)
            .unwrap();
        assert_eq!(reply.len(), 1);
        assert_eq!(reply[0].0, "s");
        assert_eq!(reply[0].1[0].0, "1-1");

        let reply: Option<()> = redis::cmd("XREAD")
            .arg("STREAMS")
            .arg("s")
            .arg("1-1")
            .query(&mut conn)
            .unwrap();
        assert_eq!(reply, None);
    })
    .await
    .unwrap();

    // blocking read woken by a later XADD
    let reader = tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);
        let reply: Vec<(String, Vec<(String, Vec<String>)>)> = redis::cmd("XREAD")
            .arg("BLOCK")
            .arg(0)
            .arg("STREAMS")
            .arg("s")
            .arg("$")
            .query(&mut conn)
            .unwrap();
        reply
    });

    tokio::task::spawn_blocking(move || {
        std::thread::sleep(std::time::Duration::from_millis(300));
        let mut conn = connect(port);
        let _: String = redis::cmd("XADD")
            .arg("s")
            .arg("2-0")
            .arg("b")
            .arg("2")
            .query(&mut conn)
            .unwrap();
    })
    .await
    .unwrap();

    let reply = reader.await.unwrap();
    assert_eq!(reply[0].1[0].0, "2-0");
}

#[tokio::test]
async fn test_xread_block_timeout() {
    let port = 18313;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);
        let reply: Option<()> = redis::cmd("XREAD")
            .arg("BLOCK")
            .arg(100)
            .arg("STREAMS")
            .arg("quiet")
            .arg("$")
            .query(&mut conn)
            .unwrap();
        assert_eq!(reply, None);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_subscribe_publish() {
    let port = 18314;
    let _server = start_server(port);
    wait_for_startup().await;

    let subscriber = tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);
        let mut pubsub = conn.as_pubsub();
        pubsub.subscribe("news").unwrap();
        let msg = pubsub.get_message().unwrap();
        let payload: String = msg.get_payload().unwrap();
        (msg.get_channel_name().to_string(), payload)
    });

    let receivers = tokio::task::spawn_blocking(move || {
        std::thread::sleep(std::time::Duration::from_millis(300));
        let mut conn = connect(port);
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg("news")
            .arg("hi")
            .query(&mut conn)
            .unwrap();
        receivers
    })
    .await
    .unwrap();
    assert!(receivers >= 1);

    let (channel, payload) = subscriber.await.unwrap();
    assert_eq!(channel, "news");
    assert_eq!(payload, "hi");
}

#[tokio::test]
async fn test_subscribed_mode_gate() {
    let port = 18315;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let _: redis::Value = redis::cmd("SUBSCRIBE").arg("c").query(&mut conn).unwrap();

        let err = redis::cmd("GET").arg("k").query::<Option<String>>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("Can't execute 'get'"));

        // PING is still allowed, with the subscribed-mode reply shape
        let reply: Vec<String> = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(reply[0], "pong");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_config_get_set() {
    let port = 18316;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let pairs: Vec<String> = redis::cmd("CONFIG").arg("GET").arg("dir").query(&mut conn).unwrap();
        assert_eq!(pairs, vec!["dir".to_string(), "/tmp".to_string()]);

        let ok: String = redis::cmd("CONFIG")
            .arg("SET")
            .arg("dbfilename")
            .arg("other.rdb")
            .query(&mut conn)
            .unwrap();
        assert_eq!(ok, "OK");

        let pairs: Vec<String> = redis::cmd("CONFIG")
            .arg("GET")
            .arg("dbfilename")
            .query(&mut conn)
            .unwrap();
        assert_eq!(pairs[1], "other.rdb");

        let err = redis::cmd("CONFIG")
            .arg("SET")
            .arg("maxmemory")
            .arg("1")
            .query::<String>(&mut conn)
            .unwrap_err();
        assert!(err.to_string().contains("unknown configuration parameter"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_hello_and_unknown_command() {
    let port = 18317;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let info: Vec<redis::Value> = redis::cmd("HELLO").arg("2").query(&mut conn).unwrap();
        assert_eq!(info.len(), 6);

        let err = redis::cmd("HELLO").arg("3").query::<redis::Value>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("NOPROTO"));

        let err = redis::cmd("FLUSHALL").query::<redis::Value>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_client_name() {
    let port = 18318;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect(port);

        let ok: String = redis::cmd("CLIENT")
            .arg("SETNAME")
            .arg("tester")
            .query(&mut conn)
            .unwrap();
        assert_eq!(ok, "OK");

        let name: String = redis::cmd("CLIENT").arg("GETNAME").query(&mut conn).unwrap();
        assert_eq!(name, "tester");
    })
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Raw-socket checks: literal request and reply bytes on a bare TCP stream.
// ---------------------------------------------------------------------------

fn send_expect(stream: &mut std::net::TcpStream, send: &[u8], expect: &[u8]) {
    use std::io::{Read, Write};
    stream.write_all(send).unwrap();
    let mut got = vec![0u8; expect.len()];
    stream.read_exact(&mut got).unwrap();
    assert_eq!(
        got,
        expect,
        "reply was {:?}",
        String::from_utf8_lossy(&got)
    );
}

#[tokio::test]
async fn test_raw_wire_scenarios() {
    let port = 18319;
    let _server = start_server(port);
    wait_for_startup().await;

    tokio::task::spawn_blocking(move || {
        let mut conn = connect_raw(port);

        // SET k v / GET k
        send_expect(
            &mut conn,
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
            b"+OK\r\n",
        );
        send_expect(&mut conn, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n");

        // SET with PX, observed after the deadline
        send_expect(
            &mut conn,
            b"*5\r\n$3\r\nSET\r\n$1\r\ne\r\n$1\r\nv\r\n$2\r\nPX\r\n$3\r\n100\r\n",
            b"+OK\r\n",
        );
        std::thread::sleep(std::time::Duration::from_millis(200));
        send_expect(&mut conn, b"*2\r\n$3\r\nGET\r\n$1\r\ne\r\n", b"$-1\r\n");

        // RPUSH / LRANGE
        send_expect(
            &mut conn,
            b"*4\r\n$5\r\nRPUSH\r\n$1\r\nL\r\n$1\r\na\r\n$1\r\nb\r\n",
            b":2\r\n",
        );
        send_expect(
            &mut conn,
            b"*4\r\n$6\r\nLRANGE\r\n$1\r\nL\r\n$1\r\n0\r\n$2\r\n-1\r\n",
            b"*2\r\n$1\r\na\r\n$1\r\nb\r\n",
        );

        // XADD duplicate id error, byte for byte
        send_expect(
            &mut conn,
            b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\na\r\n$1\r\n1\r\n",
            b"$3\r\n1-1\r\n",
        );
        send_expect(
            &mut conn,
            b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nb\r\n$1\r\n2\r\n",
            b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n",
        );

        // inline command
        send_expect(&mut conn, b"PING\r\n", b"+PONG\r\n");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_raw_blpop_handoff() {
    let port = 18320;
    let _server = start_server(port);
    wait_for_startup().await;

    let blocked = tokio::task::spawn_blocking(move || {
        use std::io::{Read, Write};
        let mut conn = connect_raw(port);
        conn.write_all(b"*3\r\n$5\r\nBLPOP\r\n$1\r\nL\r\n$1\r\n0\r\n")
            .unwrap();
        let mut got = vec![0u8; b"*2\r\n$1\r\nL\r\n$1\r\nx\r\n".len()];
        conn.read_exact(&mut got).unwrap();
        got
    });

    tokio::task::spawn_blocking(move || {
        std::thread::sleep(std::time::Duration::from_millis(300));
        let mut conn = connect_raw(port);
        send_expect(&mut conn, b"*3\r\n$5\r\nRPUSH\r\n$1\r\nL\r\n$1\r\nx\r\n", b":1\r\n");
    })
    .await
    .unwrap();

    assert_eq!(blocked.await.unwrap(), b"*2\r\n$1\r\nL\r\n$1\r\nx\r\n");
}

#[tokio::test]
async fn test_raw_subscribe_publish_frames() {
    let port = 18321;
    let _server = start_server(port);
    wait_for_startup().await;

    let subscriber = tokio::task::spawn_blocking(move || {
        use std::io::{Read, Write};
        let mut conn = connect_raw(port);
        conn.write_all(b"*2\r\n$9\r\nSUBSCRIBE\r\n$1\r\nc\r\n").unwrap();

        let confirm = b"*3\r\n$9\r\nsubscribe\r\n$1\r\nc\r\n:1\r\n";
        let mut got = vec![0u8; confirm.len()];
        conn.read_exact(&mut got).unwrap();
        assert_eq!(got, confirm);

        let frame = b"*3\r\n$7\r\nmessage\r\n$1\r\nc\r\n$2\r\nhi\r\n";
        let mut got = vec![0u8; frame.len()];
        conn.read_exact(&mut got).unwrap();
        got
    });

    tokio::task::spawn_blocking(move || {
        std::thread::sleep(std::time::Duration::from_millis(300));
        let mut conn = connect_raw(port);
        send_expect(
            &mut conn,
            b"*3\r\n$7\r\nPUBLISH\r\n$1\r\nc\r\n$2\r\nhi\r\n",
            b":1\r\n",
        );
    })
    .await
    .unwrap();

    assert_eq!(
        subscriber.await.unwrap(),
        b"*3\r\n$7\r\nmessage\r\n$1\r\nc\r\n$2\r\nhi\r\n"
    );
}
