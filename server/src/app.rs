//! Wiring and lifecycle of the reservation daemon.
//!
//! 1. **Startup**: connect `PostgreSQL` (and migrate), connect the cache,
//!    build the service
//! 2. **Runtime**: the expiration sweeper runs on its interval
//! 3. **Shutdown**: on Ctrl+C or SIGTERM the sweeper is signalled and awaited
//!    up to the configured timeout

use crate::cache::ConfiguredCache;
use crate::config::Config;
use crate::error::{Result, ServerError};
use popupmoah_reservation_core::aggregate::{ReservationAggregate, ReservationEnvironment};
use popupmoah_reservation_core::cache::ReservationCache;
use popupmoah_reservation_core::environment::SystemClock;
use popupmoah_reservation_core::notifier::{LoggingNotifier, ReservationNotifier};
use popupmoah_reservation_core::repository::ReservationRepository;
use popupmoah_reservation_core::service::ReservationApplicationService;
use popupmoah_reservation_core::sweeper::ExpirationSweeper;
use popupmoah_reservation_postgres::PostgresReservationRepository;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Production service stack.
pub type ProductionService =
    ReservationApplicationService<PostgresReservationRepository, ConfiguredCache, LoggingNotifier>;

/// Configured daemon, ready to run.
pub struct Application<R, C, N> {
    service: ReservationApplicationService<R, C, N>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Application<PostgresReservationRepository, ConfiguredCache, LoggingNotifier> {
    /// Connect every backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if `PostgreSQL` is unreachable or a migration fails. An
    /// unreachable Redis only disables caching.
    pub async fn build(config: Config) -> Result<Self> {
        info!("Connecting to PostgreSQL...");
        let repository =
            PostgresReservationRepository::connect(&config.postgres.url, config.postgres.max_connections)
                .await?;
        if config.postgres.run_migrations {
            repository.migrate().await?;
            info!("Migrations complete");
        }

        let cache = ConfiguredCache::connect(&config.redis, config.cache_ttl()).await;

        let environment = ReservationEnvironment::new(Arc::new(repository), Arc::new(SystemClock));
        let aggregate = ReservationAggregate::with_options(environment, config.aggregate_options());
        let service =
            ReservationApplicationService::new(aggregate, Arc::new(cache), Arc::new(LoggingNotifier));

        Ok(Self::new(service, config))
    }
}

impl<R, C, N> Application<R, C, N>
where
    R: ReservationRepository + 'static,
    C: ReservationCache + 'static,
    N: ReservationNotifier + 'static,
{
    /// Wrap an already wired service.
    #[must_use]
    pub fn new(service: ReservationApplicationService<R, C, N>, config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            service,
            config: Arc::new(config),
            shutdown_tx,
        }
    }

    /// The wired service.
    #[must_use]
    pub const fn service(&self) -> &ReservationApplicationService<R, C, N> {
        &self.service
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper task panicked.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper task panicked.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let interval = self.config.sweep_interval();
        info!(interval_secs = interval.as_secs(), "Starting expiration sweeper");
        let sweeper =
            ExpirationSweeper::new(self.service.clone(), interval, self.shutdown_tx.subscribe())
                .spawn();

        signal.await;
        info!("Shutdown requested, stopping background tasks...");

        // No receivers left only means the sweeper already exited.
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.config.shutdown_timeout(), sweeper).await {
            Ok(Ok(())) => {
                info!("Graceful shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => Err(ServerError::Task(e.to_string())),
            Err(_) => {
                warn!("Sweeper shutdown timed out");
                Ok(())
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
