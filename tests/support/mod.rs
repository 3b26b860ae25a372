//! Helpers shared by the integration tests and the throughput bench:
//! spawning an in-process server and connecting to it while it binds.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use shoal::config::Config;
use shoal::server::{self, ServerContext};

const CONNECT_DEADLINE: Duration = Duration::from_secs(5);

/// Spawn a server on localhost with its own isolated context.
pub fn start_server(port: u16) -> tokio::task::JoinHandle<()> {
    let config = Config {
        bind: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    };

    tokio::spawn(async move {
        let ctx = Arc::new(ServerContext::new(Arc::new(RwLock::new(config))));
        let _ = server::run_server(ctx).await;
    })
}

pub async fn wait_for_startup() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// Keep dialing until the listener accepts or the deadline passes.
fn dial<T>(port: u16, mut attempt: impl FnMut() -> Result<T, String>) -> T {
    let deadline = Instant::now() + CONNECT_DEADLINE;
    loop {
        match attempt() {
            Ok(conn) => return conn,
            Err(e) if Instant::now() >= deadline => {
                panic!("server on port {port} never came up: {e}")
            }
            Err(_) => std::thread::sleep(Duration::from_millis(50)),
        }
    }
}

/// A `redis` client connection to the server under test.
pub fn connect(port: u16) -> redis::Connection {
    let client =
        redis::Client::open(format!("redis://127.0.0.1:{port}/")).expect("client url is valid");
    dial(port, || client.get_connection().map_err(|e| e.to_string()))
}

/// A bare TCP stream, for byte-level assertions.
pub fn connect_raw(port: u16) -> std::net::TcpStream {
    dial(port, || {
        std::net::TcpStream::connect(("127.0.0.1", port)).map_err(|e| e.to_string())
    })
}
