//! Error types for reservation operations.

use crate::types::{ReservationId, ReservationStatus, Slot};
use thiserror::Error;

/// Result type alias for reservation operations.
pub type Result<T> = std::result::Result<T, ReservationError>;

/// Error taxonomy for the reservation aggregate and its collaborators.
///
/// Everything except [`ReservationError::Repository`] is a client error: the
/// caller can recover by correcting its input or choosing another slot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// A required field is missing or a value violates a domain rule.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field
        field: &'static str,
        /// Human readable reason
        message: String,
    },

    /// Another live reservation already holds the slot.
    #[error("Slot already reserved: {slot}")]
    SlotConflict {
        /// The contested slot
        slot: Slot,
    },

    /// No reservation exists with this id.
    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    /// The requested operation is not allowed from the current status.
    #[error("Cannot {operation} a reservation in status {status}")]
    InvalidStatus {
        /// Current status
        status: ReservationStatus,
        /// Rejected operation
        operation: &'static str,
    },

    /// The record changed between load and save.
    #[error("Reservation {0} was modified concurrently")]
    ConcurrentModification(ReservationId),

    /// Storage I/O failure. Fatal for the current request.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl ReservationError {
    /// Shorthand for a [`ReservationError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the caller can recover by changing its request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }

    /// HTTP-equivalent status a transport adapter should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound(_) => 404,
            Self::SlotConflict { .. }
            | Self::InvalidStatus { .. }
            | Self::ConcurrentModification(_) => 409,
            Self::Repository(_) => 500,
        }
    }

    /// Stable machine readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::SlotConflict { .. } => "SLOT_CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Repository(_) => "REPOSITORY_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PopupStoreId;
    use chrono::{TimeZone, Utc};

    #[test]
    fn only_repository_failures_are_server_errors() {
        let slot = Slot::new(
            PopupStoreId::new(42),
            Utc.with_ymd_and_hms(2025, 6, 1, 19, 0, 0).single().unwrap_or_default(),
        );

        let cases = [
            (ReservationError::validation("member_email", "blank"), 400),
            (ReservationError::SlotConflict { slot }, 409),
            (ReservationError::NotFound(ReservationId::new(3)), 404),
            (ReservationError::ConcurrentModification(ReservationId::new(3)), 409),
            (ReservationError::Repository("connection reset".into()), 500),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
            assert_eq!(error.is_client_error(), status < 500, "{error}");
        }
    }

    #[test]
    fn validation_message_names_the_field() {
        let error = ReservationError::validation("number_of_people", "must be at least 1");
        assert_eq!(error.to_string(), "Invalid number_of_people: must be at least 1");
    }
}
