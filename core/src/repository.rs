//! Reservation repository port.
//!
//! Durable storage for reservations. Implemented by
//! `popupmoah-reservation-postgres` in production and by the in-memory
//! repository of `popupmoah-reservation-testing` in tests.
//!
//! # Slot uniqueness
//!
//! The repository is the authority for the slot invariant: [`save`] must reject
//! a second non-cancelled reservation for the same
//! `(popup_store_id, reservation_date_time)` with
//! [`ReservationError::SlotConflict`] atomically (unique index, or check and
//! write under one lock). The aggregate's pre-check through
//! [`exists_by_popup_store_id_and_reservation_date_time`] only saves a write
//! attempt; it is not sufficient under concurrent load.
//!
//! Cancelled reservations release their slot: they are ignored both by the
//! existence check and by the atomic constraint.
//!
//! [`save`]: ReservationRepository::save
//! [`exists_by_popup_store_id_and_reservation_date_time`]:
//!     ReservationRepository::exists_by_popup_store_id_and_reservation_date_time
//! [`ReservationError::SlotConflict`]: crate::error::ReservationError::SlotConflict

use crate::error::Result;
use crate::types::{MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Reservation repository.
///
/// All list queries return reservations ordered by `reservation_date_time`
/// descending.
pub trait ReservationRepository: Send + Sync {
    /// Insert or update a reservation.
    ///
    /// - `id == None`: insert. The returned copy carries the assigned id,
    ///   `version == 1` and both audit timestamps.
    /// - `id == Some(_)`: update guarded by `version`. The returned copy
    ///   carries the incremented version and a fresh `updated_at`.
    ///
    /// # Errors
    ///
    /// - [`SlotConflict`](crate::error::ReservationError::SlotConflict) if
    ///   another non-cancelled reservation holds the slot
    /// - [`NotFound`](crate::error::ReservationError::NotFound) if the id to
    ///   update does not exist
    /// - [`ConcurrentModification`](crate::error::ReservationError::ConcurrentModification)
    ///   if the stored version differs from `reservation.version`
    /// - [`Repository`](crate::error::ReservationError::Repository) on I/O failure
    fn save(
        &self,
        reservation: &Reservation,
    ) -> impl Future<Output = Result<Reservation>> + Send;

    /// Look up one reservation.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure. Absence is `Ok(None)`.
    fn find_by_id(
        &self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send;

    /// All reservations of a member.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_member_id(
        &self,
        member_id: MemberId,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// All reservations of a popup store.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_popup_store_id(
        &self,
        popup_store_id: PopupStoreId,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// All reservations in a status.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_status(
        &self,
        status: ReservationStatus,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// A member's reservations in a status.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_member_id_and_status(
        &self,
        member_id: MemberId,
        status: ReservationStatus,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// A store's reservations in a status.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_popup_store_id_and_status(
        &self,
        popup_store_id: PopupStoreId,
        status: ReservationStatus,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// Reservations whose slot lies in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_by_reservation_date_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;

    /// Whether a non-cancelled reservation holds the slot.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn exists_by_popup_store_id_and_reservation_date_time(
        &self,
        popup_store_id: PopupStoreId,
        reservation_date_time: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Hard delete. Deleting a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn delete_by_id(&self, id: ReservationId) -> impl Future<Output = Result<()>> + Send;

    /// Whether a reservation with this id exists.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn exists_by_id(&self, id: ReservationId) -> impl Future<Output = Result<bool>> + Send;

    /// `PENDING` reservations whose slot lies strictly before `now`.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send;
}
