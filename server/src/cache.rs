//! Cache selected by configuration.

use crate::config::RedisConfig;
use popupmoah_reservation_core::cache::{
    CacheError, CacheKey, CachedValue, DisabledCache, ReservationCache,
};
use popupmoah_reservation_redis::RedisReservationCache;
use std::time::Duration;
use tracing::{info, warn};

/// Redis when enabled and reachable, otherwise an always-miss cache.
#[derive(Clone)]
pub enum ConfiguredCache {
    /// Reads are cached in Redis
    Redis(RedisReservationCache),
    /// Every read goes to the repository
    Disabled(DisabledCache),
}

impl ConfiguredCache {
    /// Build the cache described by `config`.
    ///
    /// An unreachable Redis is logged and replaced by [`DisabledCache`]; the
    /// service is correct without a cache.
    pub async fn connect(config: &RedisConfig, ttl: Duration) -> Self {
        if !config.enabled {
            info!("Reservation cache disabled by configuration");
            return Self::Disabled(DisabledCache);
        }

        match RedisReservationCache::new(&config.url, ttl).await {
            Ok(cache) => {
                info!(ttl_secs = ttl.as_secs(), "Reservation cache connected to Redis");
                Self::Redis(cache)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, running without reservation cache");
                Self::Disabled(DisabledCache)
            }
        }
    }

    /// Whether reads are actually cached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}

impl ReservationCache for ConfiguredCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        match self {
            Self::Redis(cache) => cache.get(key).await,
            Self::Disabled(cache) => cache.get(key).await,
        }
    }

    async fn put(&self, key: &CacheKey, value: &CachedValue) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.put(key, value).await,
            Self::Disabled(cache) => cache.put(key, value).await,
        }
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.evict(key).await,
            Self::Disabled(cache) => cache.evict(key).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use popupmoah_reservation_core::types::ReservationId;

    #[tokio::test]
    async fn disabled_by_configuration() {
        let config = RedisConfig {
            enabled: false,
            url: "redis://unused:6379".to_string(),
            ttl_secs: 60,
        };

        let cache = ConfiguredCache::connect(&config, Duration::from_secs(60)).await;

        assert!(!cache.is_enabled());
        let key = CacheKey::Reservation(ReservationId::new(1));
        cache.put(&key, &CachedValue::Reservations(Vec::new())).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_url_falls_back_to_disabled() {
        let config = RedisConfig {
            enabled: true,
            url: "not a redis url".to_string(),
            ttl_secs: 60,
        };

        let cache = ConfiguredCache::connect(&config, Duration::from_secs(60)).await;

        assert!(!cache.is_enabled());
    }
}
