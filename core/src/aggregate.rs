//! The reservation aggregate.
//!
//! Single gate for every reservation state change. It validates candidates,
//! pre-checks slot availability and drives the status state machine before
//! anything reaches the [`ReservationRepository`]. The repository's atomic
//! slot constraint stays authoritative; a [`ReservationError::SlotConflict`]
//! raised by `save` propagates unchanged.

use crate::dto::{MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_PHONE_LEN};
use crate::environment::Clock;
use crate::error::{ReservationError, Result};
use crate::repository::ReservationRepository;
use crate::types::{
    MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus, Slot, slot_instant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cancellation reason written by the expiration sweep ("slot time expired").
pub const EXPIRED_REASON: &str = "예약 시간 만료";

// ============================================================================
// Candidate
// ============================================================================

/// Unvalidated input for `create` and `update`.
///
/// Every field is optional so that a missing value is reported as a
/// validation error naming the field instead of failing at deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCandidate {
    /// Booking member
    pub member_id: Option<MemberId>,
    /// Booked store
    pub popup_store_id: Option<PopupStoreId>,
    /// Contact name
    pub member_name: Option<String>,
    /// Contact email
    pub member_email: Option<String>,
    /// Contact phone
    pub member_phone: Option<String>,
    /// Requested slot instant
    pub reservation_date_time: Option<DateTime<Utc>>,
    /// Party size as supplied by the caller
    pub number_of_people: Option<i32>,
    /// Free-text requests
    pub special_requests: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// A candidate that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ValidCandidate {
    member_id: MemberId,
    popup_store_id: PopupStoreId,
    member_name: String,
    member_email: String,
    member_phone: Option<String>,
    reservation_date_time: DateTime<Utc>,
    number_of_people: u32,
    special_requests: Option<String>,
    notes: Option<String>,
}

impl ValidCandidate {
    const fn slot(&self) -> Slot {
        Slot::new(self.popup_store_id, self.reservation_date_time)
    }

    fn into_pending(self) -> Reservation {
        Reservation {
            id: None,
            member_id: self.member_id,
            popup_store_id: self.popup_store_id,
            member_name: self.member_name,
            member_email: self.member_email,
            member_phone: self.member_phone,
            reservation_date_time: self.reservation_date_time,
            number_of_people: self.number_of_people,
            status: ReservationStatus::Pending,
            special_requests: self.special_requests,
            notes: self.notes,
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    /// Overwrites the caller-editable fields; status, transition and audit
    /// timestamps are left as they are.
    fn apply_to(self, reservation: &mut Reservation) {
        reservation.member_id = self.member_id;
        reservation.popup_store_id = self.popup_store_id;
        reservation.member_name = self.member_name;
        reservation.member_email = self.member_email;
        reservation.member_phone = self.member_phone;
        reservation.reservation_date_time = self.reservation_date_time;
        reservation.number_of_people = self.number_of_people;
        reservation.special_requests = self.special_requests;
        reservation.notes = self.notes;
    }
}

impl ReservationCandidate {
    /// Checks presence of required fields and the domain rules against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Validation`] naming the first offending field.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        self.clone().into_valid(now).map(|_| ())
    }

    fn into_valid(self, now: DateTime<Utc>) -> Result<ValidCandidate> {
        let member_id = self
            .member_id
            .ok_or_else(|| ReservationError::validation("member_id", "is required"))?;
        let popup_store_id = self
            .popup_store_id
            .ok_or_else(|| ReservationError::validation("popup_store_id", "is required"))?;

        let reservation_date_time = self
            .reservation_date_time
            .map(slot_instant)
            .ok_or_else(|| ReservationError::validation("reservation_date_time", "is required"))?;
        if reservation_date_time <= now {
            return Err(ReservationError::validation(
                "reservation_date_time",
                "must be in the future",
            ));
        }

        let requested = self
            .number_of_people
            .ok_or_else(|| ReservationError::validation("number_of_people", "is required"))?;
        let number_of_people = u32::try_from(requested)
            .ok()
            .filter(|people| *people >= 1)
            .ok_or_else(|| ReservationError::validation("number_of_people", "must be at least 1"))?;

        let member_name = required_text("member_name", self.member_name, MAX_NAME_LEN)?;
        let member_email = required_text("member_email", self.member_email, MAX_EMAIL_LEN)?;
        if let Some(phone) = self.member_phone.as_deref() {
            check_chars("member_phone", phone, MAX_PHONE_LEN)?;
        }

        Ok(ValidCandidate {
            member_id,
            popup_store_id,
            member_name,
            member_email,
            member_phone: self.member_phone,
            reservation_date_time,
            number_of_people,
            special_requests: self.special_requests,
            notes: self.notes,
        })
    }
}

fn required_text(field: &'static str, value: Option<String>, max: usize) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => {
            check_chars(field, &text, max)?;
            Ok(text)
        }
        _ => Err(ReservationError::validation(field, "must not be blank")),
    }
}

// Column widths of the contact fields.
fn check_chars(field: &'static str, text: &str, max: usize) -> Result<()> {
    if text.chars().count() > max {
        return Err(ReservationError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the reservation aggregate
pub struct ReservationEnvironment<R> {
    /// Source of truth for reservations
    pub repository: Arc<R>,
    /// Clock for validation and transition timestamps
    pub clock: Arc<dyn Clock>,
}

impl<R> ReservationEnvironment<R> {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }
}

impl<R> Clone for ReservationEnvironment<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Behavioural switches for the aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Raise `NotFound` from `confirm`/`cancel`/`complete` on a missing id
    /// instead of returning `Ok(None)`.
    pub strict_missing: bool,
}

// ============================================================================
// Sweep outcome
// ============================================================================

/// Result of one expiration sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Reservations moved to `CANCELLED` by this run
    pub cancelled: Vec<Reservation>,
    /// Candidates that left `PENDING` concurrently and were left untouched
    pub skipped: usize,
    /// Candidates whose save failed with a storage error
    pub failed: usize,
}

// ============================================================================
// Aggregate
// ============================================================================

/// The reservation aggregate.
pub struct ReservationAggregate<R> {
    env: ReservationEnvironment<R>,
    options: AggregateOptions,
}

impl<R> Clone for ReservationAggregate<R> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            options: self.options,
        }
    }
}

impl<R: ReservationRepository> ReservationAggregate<R> {
    /// Creates an aggregate with default options
    #[must_use]
    pub fn new(env: ReservationEnvironment<R>) -> Self {
        Self::with_options(env, AggregateOptions::default())
    }

    /// Creates an aggregate with explicit options
    #[must_use]
    pub const fn with_options(env: ReservationEnvironment<R>, options: AggregateOptions) -> Self {
        Self { env, options }
    }

    /// The injected environment
    #[must_use]
    pub const fn environment(&self) -> &ReservationEnvironment<R> {
        &self.env
    }

    /// Current time according to the injected clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// Validate and book a new `PENDING` reservation.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::Validation`] for a missing or invalid field
    /// - [`ReservationError::SlotConflict`] if a live reservation holds the slot
    /// - [`ReservationError::Repository`] on storage failure
    pub async fn create(&self, candidate: ReservationCandidate) -> Result<Reservation> {
        let valid = candidate.into_valid(self.now())?;
        let slot = valid.slot();

        if self.slot_taken(slot).await? {
            tracing::debug!(%slot, "Slot pre-check rejected create");
            return Err(ReservationError::SlotConflict { slot });
        }

        let saved = self.env.repository.save(&valid.into_pending()).await?;
        tracing::info!(
            reservation_id = ?saved.id,
            member_id = %saved.member_id,
            %slot,
            "Reservation created"
        );
        Ok(saved)
    }

    /// Look up one reservation; absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.env.repository.find_by_id(id).await
    }

    /// A member's reservations, latest slot first.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        self.env.repository.find_by_member_id(member_id).await
    }

    /// A store's reservations, latest slot first.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn find_by_popup_store_id(
        &self,
        popup_store_id: PopupStoreId,
    ) -> Result<Vec<Reservation>> {
        self.env.repository.find_by_popup_store_id(popup_store_id).await
    }

    /// Replace the editable fields of an existing reservation.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] if `id` does not exist
    /// - [`ReservationError::InvalidStatus`] if the reservation is terminal
    /// - [`ReservationError::Validation`] for a missing or invalid field
    /// - [`ReservationError::SlotConflict`] if the slot changed and is taken
    pub async fn update(
        &self,
        id: ReservationId,
        candidate: ReservationCandidate,
    ) -> Result<Reservation> {
        self.update_with_previous(id, candidate)
            .await
            .map(|(_, updated)| updated)
    }

    /// Like [`update`](Self::update) but also returns the record as it was
    /// before the change, so callers can tell whether the owners moved.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub async fn update_with_previous(
        &self,
        id: ReservationId,
        candidate: ReservationCandidate,
    ) -> Result<(Reservation, Reservation)> {
        let previous = self
            .env
            .repository
            .find_by_id(id)
            .await?
            .ok_or(ReservationError::NotFound(id))?;

        if previous.status.is_terminal() {
            return Err(ReservationError::InvalidStatus {
                status: previous.status,
                operation: "update",
            });
        }

        let valid = candidate.into_valid(self.now())?;
        let target = valid.slot();
        if target != previous.slot() && self.slot_taken(target).await? {
            tracing::debug!(reservation_id = %id, slot = %target, "Slot pre-check rejected update");
            return Err(ReservationError::SlotConflict { slot: target });
        }

        let mut next = previous.clone();
        valid.apply_to(&mut next);
        let updated = self.env.repository.save(&next).await?;

        tracing::info!(reservation_id = %id, "Reservation updated");
        Ok((previous, updated))
    }

    /// `PENDING → CONFIRMED`.
    ///
    /// Returns `Ok(None)` when `id` does not exist (unless strict).
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidStatus`] if not `PENDING`
    /// - [`ReservationError::ConcurrentModification`] if the record changed meanwhile
    /// - [`ReservationError::NotFound`] for a missing id in strict mode
    pub async fn confirm(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.transition(id, "confirm", |reservation, now| reservation.confirm(now))
            .await
    }

    /// `{PENDING, CONFIRMED} → CANCELLED` with a reason.
    ///
    /// Returns `Ok(None)` when `id` does not exist (unless strict).
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidStatus`] from a terminal status
    /// - [`ReservationError::ConcurrentModification`] if the record changed meanwhile
    /// - [`ReservationError::NotFound`] for a missing id in strict mode
    pub async fn cancel(
        &self,
        id: ReservationId,
        reason: impl Into<String> + Send,
    ) -> Result<Option<Reservation>> {
        let reason = reason.into();
        self.transition(id, "cancel", move |reservation, now| {
            reservation.cancel(reason, now)
        })
        .await
    }

    /// `CONFIRMED → COMPLETED`.
    ///
    /// Returns `Ok(None)` when `id` does not exist (unless strict).
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidStatus`] if not `CONFIRMED`
    /// - [`ReservationError::ConcurrentModification`] if the record changed meanwhile
    /// - [`ReservationError::NotFound`] for a missing id in strict mode
    pub async fn complete(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.transition(id, "complete", |reservation, _| reservation.complete())
            .await
    }

    /// Hard delete for administrative correction. Returns the removed record.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotFound`] if `id` does not exist.
    pub async fn delete(&self, id: ReservationId) -> Result<Reservation> {
        let existing = self
            .env
            .repository
            .find_by_id(id)
            .await?
            .ok_or(ReservationError::NotFound(id))?;

        self.env.repository.delete_by_id(id).await?;
        tracing::info!(reservation_id = %id, "Reservation deleted");
        Ok(existing)
    }

    /// Whether no live reservation holds the slot.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn is_slot_available(
        &self,
        popup_store_id: PopupStoreId,
        reservation_date_time: DateTime<Utc>,
    ) -> Result<bool> {
        self.slot_taken(Slot::new(popup_store_id, slot_instant(reservation_date_time)))
            .await
            .map(|taken| !taken)
    }

    /// Cancel every `PENDING` reservation whose slot lies before `now`.
    ///
    /// Records that leave `PENDING` concurrently are skipped, so repeated or
    /// overlapping runs converge on the same state.
    ///
    /// # Errors
    ///
    /// Returns error only if the expired reservations cannot be listed;
    /// per-record storage failures are counted in [`SweepOutcome::failed`].
    pub async fn cleanup_expired_reservations(&self, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let expired = self.env.repository.find_expired_reservations(now).await?;
        let mut outcome = SweepOutcome::default();

        for mut reservation in expired {
            if !reservation.is_pending() || !reservation.is_expired(now) {
                outcome.skipped += 1;
                continue;
            }
            if let Err(error) = reservation.cancel(EXPIRED_REASON, now) {
                tracing::debug!(reservation_id = ?reservation.id, %error, "Skipping expired reservation");
                outcome.skipped += 1;
                continue;
            }

            match self.env.repository.save(&reservation).await {
                Ok(saved) => outcome.cancelled.push(saved),
                Err(ReservationError::ConcurrentModification(id) | ReservationError::NotFound(id)) => {
                    tracing::debug!(reservation_id = %id, "Expired reservation changed during sweep");
                    outcome.skipped += 1;
                }
                Err(error) => {
                    tracing::warn!(reservation_id = ?reservation.id, %error, "Failed to expire reservation");
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            cancelled = outcome.cancelled.len(),
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Expired reservations swept"
        );
        Ok(outcome)
    }

    async fn slot_taken(&self, slot: Slot) -> Result<bool> {
        self.env
            .repository
            .exists_by_popup_store_id_and_reservation_date_time(
                slot.popup_store_id,
                slot.reservation_date_time,
            )
            .await
    }

    async fn transition<F>(
        &self,
        id: ReservationId,
        operation: &'static str,
        apply: F,
    ) -> Result<Option<Reservation>>
    where
        F: FnOnce(&mut Reservation, DateTime<Utc>) -> Result<()> + Send,
    {
        let Some(mut reservation) = self.env.repository.find_by_id(id).await? else {
            if self.options.strict_missing {
                return Err(ReservationError::NotFound(id));
            }
            tracing::debug!(reservation_id = %id, operation, "Transition on missing reservation ignored");
            return Ok(None);
        };

        apply(&mut reservation, self.now())?;
        let saved = self.env.repository.save(&reservation).await?;

        tracing::info!(
            reservation_id = %id,
            operation,
            status = %saved.status,
            "Reservation status changed"
        );
        Ok(Some(saved))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn candidate() -> ReservationCandidate {
        ReservationCandidate {
            member_id: Some(MemberId::new(7)),
            popup_store_id: Some(PopupStoreId::new(42)),
            member_name: Some("Kim Minji".to_string()),
            member_email: Some("minji@example.com".to_string()),
            member_phone: None,
            reservation_date_time: Some(Utc.with_ymd_and_hms(2025, 6, 1, 19, 0, 0).unwrap()),
            number_of_people: Some(2),
            special_requests: None,
            notes: None,
        }
    }

    fn field_of(result: Result<()>) -> &'static str {
        match result {
            Err(ReservationError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_candidate_becomes_pending() {
        let reservation = candidate().into_valid(now()).unwrap().into_pending();

        assert!(reservation.is_pending());
        assert_eq!(reservation.id, None);
        assert_eq!(reservation.number_of_people, 2);
        assert_eq!(reservation.version, 0);
    }

    #[test]
    fn missing_fields_are_named() {
        let mut c = candidate();
        c.member_id = None;
        assert_eq!(field_of(c.validate(now())), "member_id");

        let mut c = candidate();
        c.popup_store_id = None;
        assert_eq!(field_of(c.validate(now())), "popup_store_id");

        let mut c = candidate();
        c.reservation_date_time = None;
        assert_eq!(field_of(c.validate(now())), "reservation_date_time");

        let mut c = candidate();
        c.number_of_people = None;
        assert_eq!(field_of(c.validate(now())), "number_of_people");
    }

    #[test]
    fn party_size_must_be_positive() {
        for size in [0, -1, i32::MIN] {
            let mut c = candidate();
            c.number_of_people = Some(size);
            assert_eq!(field_of(c.validate(now())), "number_of_people", "size {size}");
        }
    }

    #[test]
    fn slot_must_be_strictly_in_the_future() {
        let mut c = candidate();
        c.reservation_date_time = Some(now());
        assert_eq!(field_of(c.validate(now())), "reservation_date_time");

        c.reservation_date_time = Some(now() - Duration::hours(1));
        assert_eq!(field_of(c.validate(now())), "reservation_date_time");

        c.reservation_date_time = Some(now() + Duration::seconds(1));
        assert!(c.validate(now()).is_ok());
    }

    #[test]
    fn blank_contact_fields_are_rejected() {
        let mut c = candidate();
        c.member_email = Some("   ".to_string());
        assert_eq!(field_of(c.validate(now())), "member_email");

        let mut c = candidate();
        c.member_name = Some(String::new());
        assert_eq!(field_of(c.validate(now())), "member_name");
    }

    #[test]
    fn contact_fields_are_bounded_by_column_width() {
        let mut c = candidate();
        c.member_name = Some("x".repeat(MAX_NAME_LEN + 1));
        assert_eq!(field_of(c.validate(now())), "member_name");

        let mut c = candidate();
        c.member_email = Some(format!("{}@example.com", "m".repeat(MAX_EMAIL_LEN)));
        assert_eq!(field_of(c.validate(now())), "member_email");

        let mut c = candidate();
        c.member_phone = Some("1".repeat(MAX_PHONE_LEN + 1));
        assert_eq!(field_of(c.validate(now())), "member_phone");

        let mut c = candidate();
        c.member_name = Some("가".repeat(MAX_NAME_LEN));
        assert!(c.validate(now()).is_ok());
    }

    #[test]
    fn slot_is_truncated_to_microseconds() {
        let mut c = candidate();
        let slot = c.reservation_date_time.unwrap();
        c.reservation_date_time = Some(slot + Duration::nanoseconds(500));

        let valid = c.into_valid(now()).unwrap();

        assert_eq!(valid.reservation_date_time, slot);
    }

    #[test]
    fn apply_keeps_status_and_timestamps() {
        let mut existing = candidate().into_valid(now()).unwrap().into_pending();
        existing.id = Some(ReservationId::new(1));
        existing.confirm(now()).unwrap();
        existing.created_at = Some(now());

        let mut edit = candidate();
        edit.number_of_people = Some(4);
        edit.notes = Some("window seat".to_string());
        edit.into_valid(now()).unwrap().apply_to(&mut existing);

        assert_eq!(existing.number_of_people, 4);
        assert_eq!(existing.notes.as_deref(), Some("window seat"));
        assert!(existing.is_confirmed());
        assert_eq!(existing.confirmed_at, Some(now()));
        assert_eq!(existing.created_at, Some(now()));
    }
}
