//! # Popupmoah Reservation Testing
//!
//! Test doubles for the reservation core.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory repository with the same slot and version guarantees as
//!   the PostgreSQL adapter
//! - In-memory and failing caches, a recording notifier
//! - Fixtures and a [`TestHarness`] wiring everything into a service
//! - proptest strategies for domain values
//!
//! ## Example
//!
//! ```ignore
//! use popupmoah_reservation_testing::{fixtures, TestHarness};
//!
//! #[tokio::test]
//! async fn booking_flow() {
//!     let harness = TestHarness::new();
//!     let created = harness.service.create_reservation(fixtures::create_request(7, 42)).await.unwrap();
//!     assert_eq!(created.status, ReservationStatus::Pending);
//! }
//! ```

use chrono::{DateTime, Utc};
use popupmoah_reservation_core::environment::Clock;

pub mod cache;
pub mod fixtures;
pub mod harness;
pub mod notifier;
pub mod repository;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use popupmoah_reservation_testing::mocks::FixedClock;
    /// use popupmoah_reservation_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test moves it.
    ///
    /// Clones share the same time, so the copy handed to the environment
    /// follows every [`advance`](Self::advance) made through the original.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self
                .time
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Default test instant: 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_instant() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Fixed clock at [`test_instant`]
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_instant())
    }
}

/// proptest strategies for reservation values
pub mod properties {
    use chrono::{DateTime, Duration, Utc};
    use popupmoah_reservation_core::types::ReservationStatus;
    use proptest::prelude::*;

    /// Any status
    pub fn any_status() -> impl Strategy<Value = ReservationStatus> {
        prop::sample::select(ReservationStatus::ALL.to_vec())
    }

    /// Party sizes the aggregate accepts
    pub fn valid_party_size() -> impl Strategy<Value = i32> {
        1..=20_i32
    }

    /// Party sizes the aggregate rejects
    pub fn invalid_party_size() -> impl Strategy<Value = i32> {
        i32::MIN..=0_i32
    }

    /// Instants at or before `now`, up to a year back
    pub fn past_or_present(now: DateTime<Utc>) -> impl Strategy<Value = DateTime<Utc>> {
        (0_i64..=365 * 24 * 3600).prop_map(move |secs| now - Duration::seconds(secs))
    }

    /// Instants strictly after `now`, up to a year ahead
    pub fn future(now: DateTime<Utc>) -> impl Strategy<Value = DateTime<Utc>> {
        (1_i64..=365 * 24 * 3600).prop_map(move |secs| now + Duration::seconds(secs))
    }

    /// Strings that are empty or whitespace only
    pub fn blank() -> impl Strategy<Value = String> {
        "[ \t\n]{0,8}"
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Output goes through the test harness writer so it is only shown for
/// failing tests. `RUST_LOG` controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use cache::{FailingCache, InMemoryReservationCache};
pub use harness::TestHarness;
pub use mocks::{FixedClock, ManualClock, test_clock, test_instant};
pub use notifier::RecordingNotifier;
pub use repository::InMemoryReservationRepository;
