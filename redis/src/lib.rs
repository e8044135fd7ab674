//! Redis read-through cache for Popupmoah reservations.
//!
//! Values are bincode-encoded [`CachedValue`]s stored under the
//! [`CacheKey`] rendering (`reservations::{id}`, `reservations::member:{id}`,
//! `reservations::popupstore:{id}`) with a fixed TTL.
//!
//! # Example
//!
//! ```no_run
//! use popupmoah_reservation_redis::RedisReservationCache;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RedisReservationCache::new("redis://127.0.0.1:6379", Duration::from_secs(600)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use popupmoah_reservation_core::cache::{CacheError, CacheKey, CachedValue, ReservationCache};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Default time-to-live of a cached read.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Redis-backed [`ReservationCache`].
///
/// Cheap to clone; clones share the `ConnectionManager`.
#[derive(Clone)]
pub struct RedisReservationCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    ttl: Duration,
}

impl RedisReservationCache {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `ttl` - Expiry of every written entry; rounded down to whole seconds, minimum 1
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the connection cannot be established.
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self::from_manager(conn_manager, ttl))
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager, ttl: Duration) -> Self {
        Self { conn_manager, ttl }
    }

    /// Configured entry TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

/// Encode a value for storage.
///
/// # Errors
///
/// Returns [`CacheError::Serialization`] if encoding fails.
pub fn encode(value: &CachedValue) -> Result<Vec<u8>, CacheError> {
    bincode::serialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Decode a stored value.
///
/// # Errors
///
/// Returns [`CacheError::Serialization`] if the bytes are not a [`CachedValue`].
pub fn decode(bytes: &[u8]) -> Result<CachedValue, CacheError> {
    bincode::deserialize(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
}

impl ReservationCache for RedisReservationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        let mut conn = self.conn_manager.clone();

        let bytes: Option<Vec<u8>> = conn
            .get(key.to_string())
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to read {key}: {e}")))?;

        bytes.as_deref().map(decode).transpose()
    }

    async fn put(&self, key: &CacheKey, value: &CachedValue) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let bytes = encode(value)?;
        let ttl_seconds = self.ttl_seconds();

        let (): () = conn
            .set_ex(key.to_string(), bytes, ttl_seconds)
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to write {key}: {e}")))?;

        tracing::debug!(key = %key, ttl_seconds, "Cached reservation read");
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();

        let removed: u64 = conn
            .del(key.to_string())
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to evict {key}: {e}")))?;

        tracing::debug!(key = %key, removed, "Evicted cache entry");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use popupmoah_reservation_core::types::{
        MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus,
    };

    fn reservation() -> Reservation {
        Reservation {
            id: Some(ReservationId::new(5)),
            member_id: MemberId::new(7),
            popup_store_id: PopupStoreId::new(42),
            member_name: "김민지".to_string(),
            member_email: "minji@example.com".to_string(),
            member_phone: None,
            reservation_date_time: chrono::DateTime::from_timestamp(1_780_000_000, 0).unwrap(),
            number_of_people: 3,
            status: ReservationStatus::Confirmed,
            special_requests: Some("유모차 동반".to_string()),
            notes: None,
            confirmed_at: chrono::DateTime::from_timestamp(1_770_000_000, 0),
            cancelled_at: None,
            cancellation_reason: None,
            created_at: chrono::DateTime::from_timestamp(1_760_000_000, 0),
            updated_at: chrono::DateTime::from_timestamp(1_770_000_000, 0),
            version: 2,
        }
    }

    #[test]
    fn listing_survives_encoding() {
        let value = CachedValue::Reservations(vec![reservation(), reservation()]);

        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = decode(&[0xff, 0x01]).unwrap_err();

        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
