//! Periodic expiration sweep.
//!
//! Runs [`ReservationApplicationService::cleanup_expired_reservations`] on a
//! fixed interval until a shutdown signal is broadcast. A failed run is logged
//! and the next tick tries again.
//!
//! # Example
//!
//! ```rust,ignore
//! let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//! let handle = ExpirationSweeper::new(service, Duration::from_secs(60), shutdown_rx).spawn();
//!
//! // Later
//! let _ = shutdown_tx.send(());
//! handle.await?;
//! ```

use crate::aggregate::SweepOutcome;
use crate::cache::ReservationCache;
use crate::error::Result;
use crate::notifier::ReservationNotifier;
use crate::repository::ReservationRepository;
use crate::service::ReservationApplicationService;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Default time between two sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background task cancelling expired pending reservations.
pub struct ExpirationSweeper<R, C, N> {
    /// Service the sweep runs through
    service: ReservationApplicationService<R, C, N>,

    /// Time between runs
    interval: Duration,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,
}

impl<R, C, N> ExpirationSweeper<R, C, N>
where
    R: ReservationRepository + 'static,
    C: ReservationCache + 'static,
    N: ReservationNotifier + 'static,
{
    /// Creates a sweeper
    ///
    /// # Arguments
    ///
    /// * `service` - Service whose sweep is triggered
    /// * `interval` - Time between runs; the first run happens immediately
    /// * `shutdown` - Broadcast receiver for graceful shutdown
    #[must_use]
    pub const fn new(
        service: ReservationApplicationService<R, C, N>,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            service,
            interval,
            shutdown,
        }
    }

    /// Run a single sweep now.
    ///
    /// # Errors
    ///
    /// Returns error if the expired reservations cannot be listed.
    pub async fn run_once(&self) -> Result<SweepOutcome> {
        self.service.cleanup_expired_reservations().await
    }

    /// Spawn the sweep loop as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Sweep on every tick until shutdown.
    pub async fn run(&mut self) {
        info!(interval_secs = self.interval.as_secs(), "Expiration sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Expiration sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(outcome) if outcome.cancelled.is_empty() && outcome.failed == 0 => {}
                        Ok(outcome) => info!(
                            cancelled = outcome.cancelled.len(),
                            skipped = outcome.skipped,
                            failed = outcome.failed,
                            "Expiration sweep finished"
                        ),
                        Err(error) => warn!(%error, "Expiration sweep failed"),
                    }
                }
            }
        }

        info!("Expiration sweeper stopped");
    }
}
