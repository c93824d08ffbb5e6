use std::sync::Arc;

use stompd::config::Config;
use stompd::server::Acceptor;
use stompd::stomp::LoggingSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.logging.max_level()?)
        .init();

    let acceptor = Acceptor::new(Arc::new(LoggingSink));
    acceptor.start(cfg.server.listen_addr()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    acceptor.stop().await;

    Ok(())
}
