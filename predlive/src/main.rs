mod server;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use predlive_core::{bootstrap::load_config, logging};
use predlive_hub::StreamHub;

use server::PredLiveServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration (fail fast on misconfigurations)
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Prediction Live server starting...");
    info!("HTTP address: {}", config.http_address());
    info!(
        keepalive_secs = config.broadcast.keepalive_interval_secs,
        channel_capacity = config.broadcast.channel_capacity,
        "Broadcast settings"
    );

    // 3. Subscriber registry, shared by every request handler
    let hub = Arc::new(StreamHub::new());

    // 4. Serve until a shutdown signal arrives
    PredLiveServer::new(config, hub).start().await
}
