//! Startup and shutdown failures of the daemon.

use popupmoah_reservation_core::error::ReservationError;
use thiserror::Error;

/// Errors that stop the daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Database unreachable or migrations failed
    #[error("Repository setup failed: {0}")]
    Repository(#[from] ReservationError),

    /// Tracing subscriber could not be installed
    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),

    /// Prometheus exporter could not be built or installed
    #[error("Failed to install metrics exporter: {0}")]
    Metrics(String),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, ServerError>;
