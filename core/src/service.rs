//! Reservation application service.
//!
//! Use-case orchestration over the [`ReservationAggregate`]: DTO mapping,
//! read-through caching, cache eviction after every commit and notification
//! dispatch. Cache and notifier failures are logged and never reach callers.

use crate::aggregate::{ReservationAggregate, SweepOutcome};
use crate::cache::{CacheKey, CachedValue, ReservationCache};
use crate::dto::{
    ReservationCancelRequest, ReservationCreateRequest, ReservationResponse,
    ReservationUpdateRequest,
};
use crate::error::{ReservationError, Result};
use crate::metrics;
use crate::notifier::{NotificationType, ReservationNotifier};
use crate::repository::ReservationRepository;
use crate::types::{MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Application service for reservation use cases.
pub struct ReservationApplicationService<R, C, N> {
    aggregate: ReservationAggregate<R>,
    cache: Arc<C>,
    notifier: Arc<N>,
}

impl<R, C, N> Clone for ReservationApplicationService<R, C, N> {
    fn clone(&self) -> Self {
        Self {
            aggregate: self.aggregate.clone(),
            cache: Arc::clone(&self.cache),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<R, C, N> ReservationApplicationService<R, C, N>
where
    R: ReservationRepository,
    C: ReservationCache,
    N: ReservationNotifier,
{
    /// Creates a new service
    #[must_use]
    pub const fn new(aggregate: ReservationAggregate<R>, cache: Arc<C>, notifier: Arc<N>) -> Self {
        Self {
            aggregate,
            cache,
            notifier,
        }
    }

    /// The wrapped aggregate
    #[must_use]
    pub const fn aggregate(&self) -> &ReservationAggregate<R> {
        &self.aggregate
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Book a reservation from a transport request.
    ///
    /// # Errors
    ///
    /// `Validation` or `SlotConflict` from the aggregate, `Repository` on
    /// storage failure.
    pub async fn create_reservation(
        &self,
        request: ReservationCreateRequest,
    ) -> Result<ReservationResponse> {
        let candidate = request.into_candidate()?;
        let created = self
            .aggregate
            .create(candidate)
            .await
            .inspect_err(record_conflict)?;

        self.evict_for(&created).await;
        metrics::record_reservation("created");
        self.send_reservation_notification(&created, NotificationType::Created)
            .await;

        Ok(created.into())
    }

    /// Replace the editable fields of a reservation.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, `SlotConflict` or `InvalidStatus` from the
    /// aggregate, `Repository` on storage failure.
    pub async fn update_reservation(
        &self,
        id: ReservationId,
        request: ReservationUpdateRequest,
    ) -> Result<ReservationResponse> {
        let candidate = request.into_candidate()?;
        let (previous, updated) = self
            .aggregate
            .update_with_previous(id, candidate)
            .await
            .inspect_err(record_conflict)?;

        let mut keys = CacheKey::affected_by(&previous);
        for key in CacheKey::affected_by(&updated) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        self.evict_keys(&keys).await;
        metrics::record_reservation("updated");

        Ok(updated.into())
    }

    /// Cancel a reservation with a reason.
    ///
    /// Returns `Ok(None)` when the reservation does not exist.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank or oversized reason, `InvalidStatus` from a
    /// terminal status, `Repository` on storage failure.
    pub async fn cancel_reservation(
        &self,
        id: ReservationId,
        reason: impl Into<String> + Send,
    ) -> Result<Option<ReservationResponse>> {
        let reason = ReservationCancelRequest::new(reason).into_reason()?;
        let cancelled = self.aggregate.cancel(id, reason).await?;
        self.after_transition(cancelled, "cancelled", NotificationType::Cancelled)
            .await
    }

    /// Confirm a pending reservation.
    ///
    /// Returns `Ok(None)` when the reservation does not exist.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless `PENDING`, `Repository` on storage failure.
    pub async fn confirm_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<ReservationResponse>> {
        let confirmed = self.aggregate.confirm(id).await?;
        self.after_transition(confirmed, "confirmed", NotificationType::Confirmed)
            .await
    }

    /// Mark a confirmed reservation as completed.
    ///
    /// Returns `Ok(None)` when the reservation does not exist.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless `CONFIRMED`, `Repository` on storage failure.
    pub async fn complete_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<ReservationResponse>> {
        let completed = self.aggregate.complete(id).await?;
        self.after_transition(completed, "completed", NotificationType::Completed)
            .await
    }

    /// Hard delete (administrative).
    ///
    /// # Errors
    ///
    /// `NotFound` if the reservation does not exist.
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<()> {
        let removed = self.aggregate.delete(id).await?;
        self.evict_for(&removed).await;
        metrics::record_reservation("deleted");
        Ok(())
    }

    /// Cancel expired pending reservations as of the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns error if the expired reservations cannot be listed.
    pub async fn cleanup_expired_reservations(&self) -> Result<SweepOutcome> {
        let started = Instant::now();
        let now = self.aggregate.now();

        let outcome = match self.aggregate.cleanup_expired_reservations(now).await {
            Ok(outcome) => outcome,
            Err(error) => {
                metrics::record_sweep_failed();
                return Err(error);
            }
        };

        for reservation in &outcome.cancelled {
            self.evict_for(reservation).await;
            metrics::record_reservation("expired");
            self.send_reservation_notification(reservation, NotificationType::Expired)
                .await;
        }

        metrics::record_sweep_completed(outcome.cancelled.len(), started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Read-through lookup by id. Absent reservations are not cached.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn get_reservation(&self, id: ReservationId) -> Result<Option<ReservationResponse>> {
        let key = CacheKey::Reservation(id);
        if let Some(CachedValue::Reservation(cached)) = self.cache_get(&key).await {
            return Ok(Some(cached.into()));
        }

        let Some(found) = self.aggregate.find_by_id(id).await? else {
            return Ok(None);
        };
        self.cache_put(&key, CachedValue::Reservation(found.clone()))
            .await;
        Ok(Some(found.into()))
    }

    /// Read-through listing of a member's reservations.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn get_reservations_by_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<ReservationResponse>> {
        let key = CacheKey::Member(member_id);
        if let Some(CachedValue::Reservations(cached)) = self.cache_get(&key).await {
            return Ok(into_responses(cached));
        }

        let found = self.aggregate.find_by_member_id(member_id).await?;
        self.cache_put(&key, CachedValue::Reservations(found.clone()))
            .await;
        Ok(into_responses(found))
    }

    /// Read-through listing of a store's reservations.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn get_reservations_by_popup_store(
        &self,
        popup_store_id: PopupStoreId,
    ) -> Result<Vec<ReservationResponse>> {
        let key = CacheKey::PopupStore(popup_store_id);
        if let Some(CachedValue::Reservations(cached)) = self.cache_get(&key).await {
            return Ok(into_responses(cached));
        }

        let found = self.aggregate.find_by_popup_store_id(popup_store_id).await?;
        self.cache_put(&key, CachedValue::Reservations(found.clone()))
            .await;
        Ok(into_responses(found))
    }

    /// Filtered listing. The member id wins when both ids are given.
    ///
    /// Without a status this is the cached member or store read; with one it
    /// goes to the repository.
    ///
    /// # Errors
    ///
    /// `Validation` when neither id is given, `Repository` on storage failure.
    pub async fn get_reservations(
        &self,
        member_id: Option<MemberId>,
        popup_store_id: Option<PopupStoreId>,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationResponse>> {
        let repository = &self.aggregate.environment().repository;
        match (member_id, popup_store_id, status) {
            (Some(member_id), _, None) => self.get_reservations_by_member(member_id).await,
            (Some(member_id), _, Some(status)) => repository
                .find_by_member_id_and_status(member_id, status)
                .await
                .map(into_responses),
            (None, Some(store_id), None) => self.get_reservations_by_popup_store(store_id).await,
            (None, Some(store_id), Some(status)) => repository
                .find_by_popup_store_id_and_status(store_id, status)
                .await
                .map(into_responses),
            (None, None, _) => Err(ReservationError::validation(
                "member_id",
                "one of member id or popup store id is required",
            )),
        }
    }

    /// Whether no live reservation holds the slot. Never cached.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn is_reservation_available(
        &self,
        popup_store_id: PopupStoreId,
        reservation_date_time: DateTime<Utc>,
    ) -> Result<bool> {
        self.aggregate
            .is_slot_available(popup_store_id, reservation_date_time)
            .await
    }

    /// Fire-and-forget notification. Delivery failures are only logged.
    pub async fn send_reservation_notification(
        &self,
        reservation: &Reservation,
        notification_type: NotificationType,
    ) {
        if let Err(error) = self.notifier.send(reservation, notification_type).await {
            metrics::record_notification_failed();
            tracing::warn!(
                reservation_id = ?reservation.id,
                notification_type = %notification_type,
                %error,
                "Reservation notification failed"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn after_transition(
        &self,
        reservation: Option<Reservation>,
        status: &'static str,
        notification_type: NotificationType,
    ) -> Result<Option<ReservationResponse>> {
        let Some(reservation) = reservation else {
            return Ok(None);
        };

        self.evict_for(&reservation).await;
        metrics::record_reservation(status);
        self.send_reservation_notification(&reservation, notification_type)
            .await;
        Ok(Some(reservation.into()))
    }

    async fn cache_get(&self, key: &CacheKey) -> Option<CachedValue> {
        match self.cache.get(key).await {
            Ok(Some(value)) => {
                metrics::record_cache_lookup("hit");
                Some(value)
            }
            Ok(None) => {
                metrics::record_cache_lookup("miss");
                tracing::debug!(%key, "Reservation cache miss");
                None
            }
            Err(error) => {
                metrics::record_cache_lookup("error");
                tracing::warn!(%key, %error, "Reservation cache read failed, using repository");
                None
            }
        }
    }

    async fn cache_put(&self, key: &CacheKey, value: CachedValue) {
        if let Err(error) = self.cache.put(key, &value).await {
            tracing::warn!(%key, %error, "Failed to populate reservation cache");
        }
    }

    async fn evict_for(&self, reservation: &Reservation) {
        self.evict_keys(&CacheKey::affected_by(reservation)).await;
    }

    async fn evict_keys(&self, keys: &[CacheKey]) {
        for key in keys {
            if let Err(error) = self.cache.evict(key).await {
                tracing::warn!(%key, %error, "Failed to evict reservation cache entry");
            }
        }
    }
}

fn record_conflict(error: &ReservationError) {
    if matches!(error, ReservationError::SlotConflict { .. }) {
        metrics::record_slot_conflict();
    }
}

fn into_responses(reservations: Vec<Reservation>) -> Vec<ReservationResponse> {
    reservations.into_iter().map(ReservationResponse::from).collect()
}
