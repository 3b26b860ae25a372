use std::sync::Arc;

use shoal::config::Config;
use shoal::server::{self, ServerContext};
use tokio::sync::RwLock;
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    let default_level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if config.debug {
        info!("debug command logging enabled");
    }

    let config = Arc::new(RwLock::new(config));
    let ctx = Arc::new(ServerContext::new(config));

    // A bind failure propagates out of run_server and exits non-zero
    server::run_server(ctx).await
}
