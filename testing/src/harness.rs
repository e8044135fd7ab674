//! Fully wired service over in-memory doubles.

use crate::cache::InMemoryReservationCache;
use crate::mocks::{ManualClock, test_instant};
use crate::notifier::RecordingNotifier;
use crate::repository::InMemoryReservationRepository;
use popupmoah_reservation_core::aggregate::{
    AggregateOptions, ReservationAggregate, ReservationEnvironment,
};
use popupmoah_reservation_core::cache::ReservationCache;
use popupmoah_reservation_core::notifier::ReservationNotifier;
use popupmoah_reservation_core::service::ReservationApplicationService;
use std::sync::Arc;

/// Service plus handles on every double behind it.
///
/// The clock starts at [`test_instant`] and is shared by the aggregate and
/// the repository.
pub struct TestHarness<C = InMemoryReservationCache, N = RecordingNotifier> {
    /// Service under test
    pub service: ReservationApplicationService<InMemoryReservationRepository, C, N>,
    /// Repository behind the service
    pub repository: InMemoryReservationRepository,
    /// Cache behind the service
    pub cache: Arc<C>,
    /// Notifier behind the service
    pub notifier: Arc<N>,
    /// Time source; advance it to expire reservations
    pub clock: ManualClock,
}

impl TestHarness {
    /// In-memory cache, recording notifier, lenient missing-record handling
    #[must_use]
    pub fn new() -> Self {
        Self::with(
            InMemoryReservationCache::new(),
            RecordingNotifier::new(),
            AggregateOptions::default(),
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, N> TestHarness<C, N>
where
    C: ReservationCache,
    N: ReservationNotifier,
{
    /// Wire a harness around the given cache, notifier and options
    #[must_use]
    pub fn with(cache: C, notifier: N, options: AggregateOptions) -> Self {
        let clock = ManualClock::new(test_instant());
        let repository = InMemoryReservationRepository::with_clock(Arc::new(clock.clone()));
        let cache = Arc::new(cache);
        let notifier = Arc::new(notifier);

        let env = ReservationEnvironment::new(Arc::new(repository.clone()), Arc::new(clock.clone()));
        let service = ReservationApplicationService::new(
            ReservationAggregate::with_options(env, options),
            Arc::clone(&cache),
            Arc::clone(&notifier),
        );

        Self {
            service,
            repository,
            cache,
            notifier,
            clock,
        }
    }
}
