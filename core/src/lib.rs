//! # Popupmoah Reservation Core
//!
//! Booking of exclusive popup-store slots: a member claims a
//! `(popup store, instant)` slot, the store confirms, the visit completes, or
//! the reservation is cancelled along the way.
//!
//! ## Components
//!
//! - [`aggregate::ReservationAggregate`]: validation, slot pre-check and the
//!   status state machine. Every state change goes through it.
//! - [`repository::ReservationRepository`]: durable storage port, authoritative
//!   for slot uniqueness.
//! - [`service::ReservationApplicationService`]: use cases, read-through
//!   caching and notifications.
//! - [`cache::ReservationCache`] / [`notifier::ReservationNotifier`]: best-effort
//!   side channels that never fail a request.
//! - [`sweeper::ExpirationSweeper`]: cancels `PENDING` reservations whose slot
//!   time has passed.
//!
//! ## Example
//!
//! ```ignore
//! use popupmoah_reservation_core::prelude::*;
//!
//! let env = ReservationEnvironment::new(Arc::new(repository), Arc::new(SystemClock));
//! let service = ReservationApplicationService::new(
//!     ReservationAggregate::new(env),
//!     Arc::new(DisabledCache),
//!     Arc::new(LoggingNotifier),
//! );
//!
//! let created = service.create_reservation(request).await?;
//! service.confirm_reservation(created.id.unwrap()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod cache;
pub mod dto;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod sweeper;
pub mod types;

pub use error::{ReservationError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::aggregate::{
        AggregateOptions, EXPIRED_REASON, ReservationAggregate, ReservationCandidate,
        ReservationEnvironment, SweepOutcome,
    };
    pub use crate::cache::{CacheError, CacheKey, CachedValue, DisabledCache, ReservationCache};
    pub use crate::dto::{
        ErrorResponse, ReservationCancelRequest, ReservationCreateRequest, ReservationResponse,
        ReservationUpdateRequest,
    };
    pub use crate::environment::{Clock, SystemClock};
    pub use crate::error::{ReservationError, Result};
    pub use crate::notifier::{LoggingNotifier, NotificationType, NotifyError, ReservationNotifier};
    pub use crate::repository::ReservationRepository;
    pub use crate::service::ReservationApplicationService;
    pub use crate::sweeper::ExpirationSweeper;
    pub use crate::types::{
        MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus, Slot,
    };
}
