//! Read-through cache port.
//!
//! The cache is a disposable projection of the repository. It is never
//! consulted for slot decisions and the service stays correct with
//! [`DisabledCache`] (always miss) in its place.
//!
//! # Keys
//!
//! All keys live in the `reservations` namespace:
//! - `reservations::{id}` → one [`Reservation`]
//! - `reservations::member:{member_id}` → a member's reservations
//! - `reservations::popupstore:{popup_store_id}` → a store's reservations

use crate::types::{MemberId, PopupStoreId, Reservation, ReservationId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Namespace shared by every reservation cache key.
pub const CACHE_NAMESPACE: &str = "reservations";

/// Cache adapter failure.
///
/// Never surfaced to service callers; logged and treated as a miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend unreachable or command failed
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Key of a cached reservation read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Single reservation by id
    Reservation(ReservationId),
    /// `member:<id>` list
    Member(MemberId),
    /// `popupstore:<id>` list
    PopupStore(PopupStoreId),
}

impl CacheKey {
    /// Every key a mutation of `reservation` can make stale.
    ///
    /// The id key is omitted for reservations that were never saved.
    #[must_use]
    pub fn affected_by(reservation: &Reservation) -> Vec<Self> {
        let mut keys = Vec::with_capacity(3);
        if let Some(id) = reservation.id {
            keys.push(Self::Reservation(id));
        }
        keys.push(Self::Member(reservation.member_id));
        keys.push(Self::PopupStore(reservation.popup_store_id));
        keys
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reservation(id) => write!(f, "{CACHE_NAMESPACE}::{id}"),
            Self::Member(id) => write!(f, "{CACHE_NAMESPACE}::member:{id}"),
            Self::PopupStore(id) => write!(f, "{CACHE_NAMESPACE}::popupstore:{id}"),
        }
    }
}

/// A cached read result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachedValue {
    /// Result of a lookup by id
    Reservation(Reservation),
    /// Result of a member or store listing
    Reservations(Vec<Reservation>),
}

/// Reservation cache.
pub trait ReservationCache: Send + Sync {
    /// Look up a key.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or the stored value is unreadable.
    fn get(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = Result<Option<CachedValue>, CacheError>> + Send;

    /// Store a value under a key.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or the value cannot be encoded.
    fn put(
        &self,
        key: &CacheKey,
        value: &CachedValue,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove a key. Evicting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn evict(&self, key: &CacheKey) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Cache that stores nothing; every read is a miss.
///
/// Used when caching is switched off in configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl ReservationCache for DisabledCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _value: &CachedValue) -> Result<(), CacheError> {
        Ok(())
    }

    async fn evict(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_in_the_reservations_namespace() {
        assert_eq!(CacheKey::Reservation(ReservationId::new(5)).to_string(), "reservations::5");
        assert_eq!(CacheKey::Member(MemberId::new(7)).to_string(), "reservations::member:7");
        assert_eq!(
            CacheKey::PopupStore(PopupStoreId::new(42)).to_string(),
            "reservations::popupstore:42"
        );
    }
}
