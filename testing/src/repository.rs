//! In-memory reservation repository.
//!
//! Behaves like the PostgreSQL adapter where it matters for correctness: the
//! slot check and the write happen under one lock, updates are guarded by
//! `version`, slot instants keep microsecond precision, and list queries come
//! back latest slot first with ties broken by id descending.

use popupmoah_reservation_core::environment::Clock;
use popupmoah_reservation_core::error::{ReservationError, Result};
use popupmoah_reservation_core::repository::ReservationRepository;
use popupmoah_reservation_core::types::{
    MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus, slot_instant,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::mocks::test_clock;

struct Table {
    rows: BTreeMap<ReservationId, Reservation>,
    next_id: i64,
}

/// In-memory reservation repository for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use popupmoah_reservation_testing::InMemoryReservationRepository;
///
/// let repository = InMemoryReservationRepository::new();
/// assert!(repository.is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryReservationRepository {
    table: Arc<Mutex<Table>>,
    clock: Arc<dyn Clock>,
    unavailable: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryReservationRepository {
    /// Create an empty repository stamping audit times from [`test_clock`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(test_clock()))
    }

    /// Create an empty repository stamping audit times from `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
            clock,
            unavailable: Arc::new(AtomicBool::new(false)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every following call fail with a repository error (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of stored reservations
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().map_or(0, |table| table.rows.len())
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored copy of a reservation, bypassing the async port
    #[must_use]
    pub fn stored(&self, id: ReservationId) -> Option<Reservation> {
        self.table
            .lock()
            .ok()
            .and_then(|table| table.rows.get(&id).cloned())
    }

    /// Overwrite a stored row as-is (no version bump, no slot check).
    ///
    /// Lets tests simulate a concurrent writer.
    pub fn force_put(&self, reservation: Reservation) {
        if let (Ok(mut table), Some(id)) = (self.table.lock(), reservation.id) {
            table.rows.insert(id, reservation);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Table>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReservationError::Repository(
                "repository unavailable".to_string(),
            ));
        }
        self.table
            .lock()
            .map_err(|_| ReservationError::Repository("Mutex lock failed".to_string()))
    }

    fn select<F>(&self, filter: F) -> Result<Vec<Reservation>>
    where
        F: Fn(&Reservation) -> bool,
    {
        let table = self.lock()?;
        let mut found: Vec<Reservation> = table
            .rows
            .values()
            .filter(|reservation| filter(reservation))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.reservation_date_time
                .cmp(&a.reservation_date_time)
                .then(b.id.cmp(&a.id))
        });
        Ok(found)
    }

    fn save_locked(&self, reservation: &Reservation) -> Result<Reservation> {
        let now = self.clock.now();
        let mut table = self.lock()?;

        let mut next = reservation.clone();
        next.reservation_date_time = slot_instant(reservation.reservation_date_time);
        if let Some(id) = reservation.id {
            let stored = table.rows.get(&id).ok_or(ReservationError::NotFound(id))?;
            if stored.version != reservation.version {
                return Err(ReservationError::ConcurrentModification(id));
            }
            next.created_at = stored.created_at;
            next.version = stored.version + 1;
        } else {
            next.created_at = Some(now);
            next.version = 1;
        }

        let slot = next.slot();
        let taken = next.status != ReservationStatus::Cancelled
            && table.rows.values().any(|other| {
                other.id != next.id
                    && other.status != ReservationStatus::Cancelled
                    && other.slot() == slot
            });
        if taken {
            return Err(ReservationError::SlotConflict { slot });
        }

        let id = match next.id {
            Some(id) => id,
            None => {
                let id = ReservationId::new(table.next_id);
                table.next_id += 1;
                id
            }
        };
        next.id = Some(id);
        next.updated_at = Some(now);
        table.rows.insert(id, next.clone());
        drop(table);

        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }
}

impl Default for InMemoryReservationRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationRepository for InMemoryReservationRepository {
    async fn save(&self, reservation: &Reservation) -> Result<Reservation> {
        self.save_locked(reservation)
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        self.select(|r| r.member_id == member_id)
    }

    async fn find_by_popup_store_id(&self, popup_store_id: PopupStoreId) -> Result<Vec<Reservation>> {
        self.select(|r| r.popup_store_id == popup_store_id)
    }

    async fn find_by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>> {
        self.select(|r| r.status == status)
    }

    async fn find_by_member_id_and_status(
        &self,
        member_id: MemberId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>> {
        self.select(|r| r.member_id == member_id && r.status == status)
    }

    async fn find_by_popup_store_id_and_status(
        &self,
        popup_store_id: PopupStoreId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>> {
        self.select(|r| r.popup_store_id == popup_store_id && r.status == status)
    }

    async fn find_by_reservation_date_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        self.select(|r| r.reservation_date_time >= start && r.reservation_date_time <= end)
    }

    async fn exists_by_popup_store_id_and_reservation_date_time(
        &self,
        popup_store_id: PopupStoreId,
        reservation_date_time: DateTime<Utc>,
    ) -> Result<bool> {
        let at = slot_instant(reservation_date_time);
        Ok(self.lock()?.rows.values().any(|r| {
            r.popup_store_id == popup_store_id
                && r.reservation_date_time == at
                && r.status != ReservationStatus::Cancelled
        }))
    }

    async fn delete_by_id(&self, id: ReservationId) -> Result<()> {
        self.lock()?.rows.remove(&id);
        Ok(())
    }

    async fn exists_by_id(&self, id: ReservationId) -> Result<bool> {
        Ok(self.lock()?.rows.contains_key(&id))
    }

    async fn find_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        self.select(|r| r.status == ReservationStatus::Pending && r.reservation_date_time < now)
    }
}
