//! Popupmoah reservation daemon.

use popupmoah_reservation_server::{Application, Config, telemetry};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    telemetry::init_tracing(&config.server.log_level)?;

    info!("Starting Popupmoah reservation daemon");
    info!(
        redis_enabled = config.redis.enabled,
        sweep_interval_secs = config.sweeper.interval_secs,
        strict_not_found = config.reservations.strict_not_found,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config.metrics_address().parse()?;
    telemetry::install_metrics(metrics_addr)?;

    let app = Application::build(config).await?;
    app.run().await?;

    Ok(())
}
