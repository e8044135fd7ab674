//! `PostgreSQL` reservation repository for Popupmoah.
//!
//! Implements [`ReservationRepository`] on top of a sqlx [`PgPool`]. The slot
//! invariant is enforced by a partial unique index on
//! `(popup_store_id, reservation_date_time) WHERE status <> 'CANCELLED'`, and
//! updates are guarded by the `version` column.
//!
//! # Example
//!
//! ```no_run
//! use popupmoah_reservation_postgres::PostgresReservationRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = PostgresReservationRepository::connect("postgres://localhost/popupmoah", 10).await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use popupmoah_reservation_core::error::{ReservationError, Result};
use popupmoah_reservation_core::repository::ReservationRepository;
use popupmoah_reservation_core::types::{
    MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus, Slot,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const COLUMNS: &str = "id, member_id, popup_store_id, member_name, member_email, member_phone, \
     reservation_date_time, number_of_people, status, special_requests, notes, \
     confirmed_at, cancelled_at, cancellation_reason, created_at, updated_at, version";

/// One row of the `reservations` table.
#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: i64,
    member_id: i64,
    popup_store_id: i64,
    member_name: String,
    member_email: String,
    member_phone: Option<String>,
    reservation_date_time: DateTime<Utc>,
    number_of_people: i32,
    status: String,
    special_requests: Option<String>,
    notes: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = ReservationError;

    fn try_from(row: ReservationRow) -> Result<Self> {
        let status = row.status.parse::<ReservationStatus>().map_err(|_| {
            ReservationError::Repository(format!(
                "Reservation {} has unknown status `{}`",
                row.id, row.status
            ))
        })?;
        let number_of_people = u32::try_from(row.number_of_people).map_err(|_| {
            ReservationError::Repository(format!(
                "Reservation {} has invalid party size {}",
                row.id, row.number_of_people
            ))
        })?;

        Ok(Self {
            id: Some(ReservationId::new(row.id)),
            member_id: MemberId::new(row.member_id),
            popup_store_id: PopupStoreId::new(row.popup_store_id),
            member_name: row.member_name,
            member_email: row.member_email,
            member_phone: row.member_phone,
            reservation_date_time: row.reservation_date_time,
            number_of_people,
            status,
            special_requests: row.special_requests,
            notes: row.notes,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            version: row.version,
        })
    }
}

fn into_reservations(rows: Vec<ReservationRow>) -> Result<Vec<Reservation>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

/// Map a sqlx failure to a fatal repository error.
fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> ReservationError {
    move |e| ReservationError::Repository(format!("{context}: {e}"))
}

/// Map a write failure, turning the live-slot unique violation into a conflict.
fn write_error(slot: Slot, context: &'static str) -> impl FnOnce(sqlx::Error) -> ReservationError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return ReservationError::SlotConflict { slot };
            }
        }
        ReservationError::Repository(format!("{context}: {e}"))
    }
}

/// `PostgreSQL` reservation repository.
#[derive(Clone, Debug)]
pub struct PostgresReservationRepository {
    pool: PgPool,
}

impl PostgresReservationRepository {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Repository`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(storage("Failed to connect to PostgreSQL"))?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ReservationError::Repository(format!("Migration failed: {e}")))?;
        Ok(())
    }

    async fn insert(&self, reservation: &Reservation) -> Result<Reservation> {
        let sql = format!(
            "INSERT INTO reservations (member_id, popup_store_id, member_name, member_email, \
             member_phone, reservation_date_time, number_of_people, status, special_requests, \
             notes, confirmed_at, cancelled_at, cancellation_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        let row: ReservationRow = sqlx::query_as(&sql)
            .bind(reservation.member_id.value())
            .bind(reservation.popup_store_id.value())
            .bind(&reservation.member_name)
            .bind(&reservation.member_email)
            .bind(&reservation.member_phone)
            .bind(reservation.reservation_date_time)
            .bind(party_size(reservation)?)
            .bind(reservation.status.as_str())
            .bind(&reservation.special_requests)
            .bind(&reservation.notes)
            .bind(reservation.confirmed_at)
            .bind(reservation.cancelled_at)
            .bind(&reservation.cancellation_reason)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error(reservation.slot(), "Failed to insert reservation"))?;

        let saved = Reservation::try_from(row)?;
        tracing::debug!(reservation_id = ?saved.id, slot = %saved.slot(), "Inserted reservation");
        Ok(saved)
    }

    async fn update(&self, id: ReservationId, reservation: &Reservation) -> Result<Reservation> {
        let sql = format!(
            "UPDATE reservations SET member_id = $3, popup_store_id = $4, member_name = $5, \
             member_email = $6, member_phone = $7, reservation_date_time = $8, \
             number_of_people = $9, status = $10, special_requests = $11, notes = $12, \
             confirmed_at = $13, cancelled_at = $14, cancellation_reason = $15, \
             updated_at = now(), version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        let row: Option<ReservationRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .bind(reservation.version)
            .bind(reservation.member_id.value())
            .bind(reservation.popup_store_id.value())
            .bind(&reservation.member_name)
            .bind(&reservation.member_email)
            .bind(&reservation.member_phone)
            .bind(reservation.reservation_date_time)
            .bind(party_size(reservation)?)
            .bind(reservation.status.as_str())
            .bind(&reservation.special_requests)
            .bind(&reservation.notes)
            .bind(reservation.confirmed_at)
            .bind(reservation.cancelled_at)
            .bind(&reservation.cancellation_reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error(reservation.slot(), "Failed to update reservation"))?;

        match row {
            Some(row) => Reservation::try_from(row),
            // Zero rows: either the id is gone or the version moved on.
            None if self.exists_by_id(id).await? => {
                tracing::debug!(reservation_id = %id, version = reservation.version, "Stale reservation version");
                Err(ReservationError::ConcurrentModification(id))
            }
            None => Err(ReservationError::NotFound(id)),
        }
    }

    async fn list(
        &self,
        filter: &str,
        binds: ListBinds,
        context: &'static str,
    ) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM reservations WHERE {filter} \
             ORDER BY reservation_date_time DESC, id DESC"
        );
        let query = sqlx::query_as::<_, ReservationRow>(&sql);
        let query = match binds {
            ListBinds::Id(id) => query.bind(id),
            ListBinds::Status(status) => query.bind(status.as_str()),
            ListBinds::IdAndStatus(id, status) => query.bind(id).bind(status.as_str()),
            ListBinds::Before(now) => query.bind(now),
            ListBinds::Between(start, end) => query.bind(start).bind(end),
        };
        let rows = query.fetch_all(&self.pool).await.map_err(storage(context))?;
        into_reservations(rows)
    }
}

/// Parameters of a list query, in placeholder order.
enum ListBinds {
    Id(i64),
    Status(ReservationStatus),
    IdAndStatus(i64, ReservationStatus),
    Before(DateTime<Utc>),
    Between(DateTime<Utc>, DateTime<Utc>),
}

fn party_size(reservation: &Reservation) -> Result<i32> {
    i32::try_from(reservation.number_of_people).map_err(|_| {
        ReservationError::validation("number_of_people", "party size out of range")
    })
}

impl ReservationRepository for PostgresReservationRepository {
    #[tracing::instrument(skip(self, reservation), fields(reservation_id = ?reservation.id))]
    async fn save(&self, reservation: &Reservation) -> Result<Reservation> {
        match reservation.id {
            None => self.insert(reservation).await,
            Some(id) => self.update(id, reservation).await,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {COLUMNS} FROM reservations WHERE id = $1");
        let row: Option<ReservationRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load reservation"))?;
        row.map(Reservation::try_from).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<Reservation>> {
        self.list(
            "member_id = $1",
            ListBinds::Id(member_id.value()),
            "Failed to list member reservations",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_popup_store_id(&self, popup_store_id: PopupStoreId) -> Result<Vec<Reservation>> {
        self.list(
            "popup_store_id = $1",
            ListBinds::Id(popup_store_id.value()),
            "Failed to list store reservations",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>> {
        self.list(
            "status = $1",
            ListBinds::Status(status),
            "Failed to list reservations by status",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_member_id_and_status(
        &self,
        member_id: MemberId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>> {
        self.list(
            "member_id = $1 AND status = $2",
            ListBinds::IdAndStatus(member_id.value(), status),
            "Failed to list member reservations",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_popup_store_id_and_status(
        &self,
        popup_store_id: PopupStoreId,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>> {
        self.list(
            "popup_store_id = $1 AND status = $2",
            ListBinds::IdAndStatus(popup_store_id.value(), status),
            "Failed to list store reservations",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_reservation_date_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        self.list(
            "reservation_date_time BETWEEN $1 AND $2",
            ListBinds::Between(start, end),
            "Failed to list reservations in range",
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn exists_by_popup_store_id_and_reservation_date_time(
        &self,
        popup_store_id: PopupStoreId,
        reservation_date_time: DateTime<Utc>,
    ) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE popup_store_id = $1
                  AND reservation_date_time = $2
                  AND status <> 'CANCELLED'
            )
            ",
        )
        .bind(popup_store_id.value())
        .bind(reservation_date_time)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to check slot"))?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_id(&self, id: ReservationId) -> Result<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to delete reservation"))?;
        tracing::debug!(reservation_id = %id, rows = result.rows_affected(), "Deleted reservation");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn exists_by_id(&self, id: ReservationId) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM reservations WHERE id = $1)")
                .bind(id.value())
                .fetch_one(&self.pool)
                .await
                .map_err(storage("Failed to check reservation"))?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self))]
    async fn find_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        self.list(
            "status = 'PENDING' AND reservation_date_time < $1",
            ListBinds::Before(now),
            "Failed to list expired reservations",
        )
        .await
    }
}
