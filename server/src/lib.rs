//! Reservation sweeper daemon for Popupmoah.
//!
//! Loads [`Config`] from the environment, wires the `PostgreSQL` repository,
//! the optional Redis cache and the logging notifier into a
//! [`ReservationApplicationService`](popupmoah_reservation_core::service::ReservationApplicationService),
//! and runs the expiration sweeper until shutdown.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod telemetry;

pub use app::{Application, ProductionService, shutdown_signal};
pub use cache::ConfiguredCache;
pub use config::Config;
pub use error::{Result, ServerError};
