//! Domain types for popup-store reservations.
//!
//! Contains the identifiers, the [`ReservationStatus`] state machine and the
//! [`Reservation`] entity itself. Every status change goes through an explicit
//! transition method (`confirm`, `cancel`, `complete`) that only touches the
//! fields relevant to that transition.

use crate::error::{ReservationError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a persisted reservation, assigned by the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationId(i64);

impl ReservationId {
    /// Creates a `ReservationId` from its raw value
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the booking member (owned by the member aggregate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(i64);

impl MemberId {
    /// Creates a `MemberId` from its raw value
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the popup store being booked (owned by the catalog).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PopupStoreId(i64);

impl PopupStoreId {
    /// Creates a `PopupStoreId` from its raw value
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PopupStoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Slot
// ============================================================================

/// The `(popup store, instant)` pair a reservation claims.
///
/// At most one non-cancelled reservation may hold a given slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Store being booked
    pub popup_store_id: PopupStoreId,
    /// Exact reserved instant
    pub reservation_date_time: DateTime<Utc>,
}

impl Slot {
    /// Creates a new `Slot`
    #[must_use]
    pub const fn new(popup_store_id: PopupStoreId, reservation_date_time: DateTime<Utc>) -> Self {
        Self {
            popup_store_id,
            reservation_date_time,
        }
    }
}

/// Digits of sub-second precision a slot instant keeps.
///
/// Matches `TIMESTAMPTZ`, so two instants are the same slot exactly when
/// storage would make them equal.
pub const SLOT_SUBSEC_DIGITS: u16 = 6;

/// Truncates `instant` to slot precision (whole microseconds).
#[must_use]
pub fn slot_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(SLOT_SUBSEC_DIGITS)
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "popupstore {} at {}",
            self.popup_store_id,
            self.reservation_date_time.to_rfc3339()
        )
    }
}

// ============================================================================
// Status
// ============================================================================

/// Reservation lifecycle status.
///
/// ```text
/// PENDING ──confirm──▶ CONFIRMED ──complete──▶ COMPLETED
///    │                     │
///    └──────cancel─────────┴───────cancel─────▶ CANCELLED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Booked, awaiting confirmation
    Pending,
    /// Confirmed by the store
    Confirmed,
    /// Cancelled by the member, the store, or the expiration sweep
    Cancelled,
    /// Visit took place
    Completed,
}

impl ReservationStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Wire/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Whether no transition leaves this status
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Whether the state machine has an edge from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending | Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ReservationError::validation("status", format!("unknown status `{s}`")))
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// A member's booking of a popup-store slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Assigned by the repository on first save
    pub id: Option<ReservationId>,
    /// Booking member
    pub member_id: MemberId,
    /// Booked store
    pub popup_store_id: PopupStoreId,
    /// Member name at booking time
    pub member_name: String,
    /// Member email at booking time
    pub member_email: String,
    /// Member phone at booking time
    pub member_phone: Option<String>,
    /// Reserved instant
    pub reservation_date_time: DateTime<Utc>,
    /// Party size (at least one)
    pub number_of_people: u32,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Free-text requests from the member
    pub special_requests: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Set by `confirm`
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Set by `cancel`
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set by `cancel`
    pub cancellation_reason: Option<String>,
    /// Maintained by the repository
    pub created_at: Option<DateTime<Utc>>,
    /// Maintained by the repository
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, 0 before the first save
    pub version: i64,
}

impl Reservation {
    /// The slot this reservation claims
    #[must_use]
    pub const fn slot(&self) -> Slot {
        Slot::new(self.popup_store_id, self.reservation_date_time)
    }

    /// Whether the reservation awaits confirmation
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// Whether the reservation was confirmed
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    /// Whether the reservation was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled
    }

    /// Whether the visit was completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ReservationStatus::Completed
    }

    /// Whether the slot time lies before `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reservation_date_time < now
    }

    /// `PENDING → CONFIRMED`, stamping `confirmed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidStatus`] from any other status.
    pub fn confirm(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_transition(ReservationStatus::Confirmed, "confirm")?;
        self.status = ReservationStatus::Confirmed;
        self.confirmed_at = Some(at);
        Ok(())
    }

    /// `{PENDING, CONFIRMED} → CANCELLED`, stamping `cancelled_at` and the reason.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidStatus`] from a terminal status.
    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.ensure_transition(ReservationStatus::Cancelled, "cancel")?;
        self.status = ReservationStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }

    /// `CONFIRMED → COMPLETED`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidStatus`] from any other status.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_transition(ReservationStatus::Completed, "complete")?;
        self.status = ReservationStatus::Completed;
        Ok(())
    }

    fn ensure_transition(&self, next: ReservationStatus, operation: &'static str) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ReservationError::InvalidStatus {
                status: self.status,
                operation,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn pending() -> Reservation {
        Reservation {
            id: Some(ReservationId::new(1)),
            member_id: MemberId::new(7),
            popup_store_id: PopupStoreId::new(42),
            member_name: "Kim".to_string(),
            member_email: "kim@example.com".to_string(),
            member_phone: None,
            reservation_date_time: at(19),
            number_of_people: 2,
            status: ReservationStatus::Pending,
            special_requests: None,
            notes: None,
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: None,
            updated_at: None,
            version: 1,
        }
    }

    #[test]
    fn confirm_stamps_confirmed_at() {
        let mut reservation = pending();
        reservation.confirm(at(10)).unwrap();

        assert!(reservation.is_confirmed());
        assert_eq!(reservation.confirmed_at, Some(at(10)));
        assert_eq!(reservation.cancelled_at, None);
    }

    #[test]
    fn cancel_from_confirmed_records_reason() {
        let mut reservation = pending();
        reservation.confirm(at(10)).unwrap();
        reservation.cancel("member request", at(11)).unwrap();

        assert!(reservation.is_cancelled());
        assert_eq!(reservation.cancelled_at, Some(at(11)));
        assert_eq!(reservation.cancellation_reason.as_deref(), Some("member request"));
        // confirm timestamp survives the cancel
        assert_eq!(reservation.confirmed_at, Some(at(10)));
    }

    #[test]
    fn complete_requires_confirmation() {
        let mut reservation = pending();
        let err = reservation.complete().unwrap_err();

        assert_eq!(
            err,
            ReservationError::InvalidStatus {
                status: ReservationStatus::Pending,
                operation: "complete",
            }
        );
        assert!(reservation.is_pending());
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut cancelled = pending();
        cancelled.cancel("gone", at(9)).unwrap();
        let snapshot = cancelled.clone();

        assert!(cancelled.confirm(at(10)).is_err());
        assert!(cancelled.complete().is_err());
        assert!(cancelled.cancel("again", at(10)).is_err());
        assert_eq!(cancelled, snapshot);

        let mut completed = pending();
        completed.confirm(at(9)).unwrap();
        completed.complete().unwrap();
        assert!(completed.cancel("late", at(10)).is_err());
        assert!(completed.confirm(at(10)).is_err());
        assert!(completed.is_completed());
    }

    #[test]
    fn transition_table_matches_state_machine() {
        use ReservationStatus::{Cancelled, Completed, Confirmed, Pending};

        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
        ];

        for from in ReservationStatus::ALL {
            for to in ReservationStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("confirmed".parse::<ReservationStatus>().unwrap(), ReservationStatus::Confirmed);
        assert_eq!(" PENDING ".parse::<ReservationStatus>().unwrap(), ReservationStatus::Pending);
        assert!("ARCHIVED".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let reservation = pending();
        assert!(!reservation.is_expired(at(19)));
        assert!(reservation.is_expired(at(20)));
    }

    #[test]
    fn slot_instant_drops_sub_microseconds() {
        let base = at(19);
        let nanos = base + chrono::Duration::nanoseconds(1_500);

        assert_eq!(slot_instant(nanos), base + chrono::Duration::microseconds(1));
        assert_eq!(slot_instant(base + chrono::Duration::nanoseconds(999)), base);
        assert_eq!(slot_instant(base), base);
    }
}
