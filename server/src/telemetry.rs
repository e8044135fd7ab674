//! Tracing and Prometheus bootstrap.

use crate::error::{Result, ServerError};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use popupmoah_reservation_core::metrics::register_reservation_metrics;
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: `RUST_LOG` if set, else `default_filter`.
///
/// # Errors
///
/// Returns [`ServerError::Tracing`] if a subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| ServerError::Tracing(e.to_string()))
}

/// Serve Prometheus metrics on `addr` and describe the reservation metrics.
///
/// Must run inside a tokio runtime.
///
/// # Errors
///
/// Returns [`ServerError::Metrics`] if the exporter cannot be built or bound.
pub fn install_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))?
        .install()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    register_reservation_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}
