//! Notification boundary.
//!
//! Delivery (email, SMS, push) is owned by another system. The service fires a
//! notification after a successful mutation and never lets a delivery failure
//! roll the mutation back.

use crate::types::Reservation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Why a member is being notified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Reservation booked
    Created,
    /// Reservation confirmed by the store
    Confirmed,
    /// Reservation cancelled by a caller
    Cancelled,
    /// Visit completed
    Completed,
    /// Reservation cancelled by the expiration sweep
    Expired,
}

impl NotificationType {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery failure reported by a notifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notifier.
pub trait ReservationNotifier: Send + Sync {
    /// Deliver a notification about `reservation`.
    ///
    /// # Errors
    ///
    /// Returns error if delivery fails. Callers log and continue.
    fn send(
        &self,
        reservation: &Reservation,
        notification_type: NotificationType,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl ReservationNotifier for LoggingNotifier {
    async fn send(
        &self,
        reservation: &Reservation,
        notification_type: NotificationType,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            reservation_id = ?reservation.id,
            member_id = %reservation.member_id,
            notification_type = %notification_type,
            "Reservation notification dispatched"
        );
        Ok(())
    }
}
