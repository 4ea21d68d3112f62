//! Node-pair distance table.
//!
//! The matcher and retiming ask for the same node-to-node driving distances
//! over and over, within one request and across requests. This layer keeps
//! successful lookups in a bounded, time-limited moka cache in front of any
//! [`RoutingProvider`].

use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::Coordinate;
use crate::routing::{RouteSummary, RoutingError, RoutingProvider, TurnByTurn};

/// Cache key: bit patterns of (from lat, from lon, to lat, to lon).
type PairKey = (u64, u64, u64, u64);

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_capacity: 50_000,
        }
    }
}

fn pair_key(from: Coordinate, to: Coordinate) -> PairKey {
    (
        from.latitude.to_bits(),
        from.longitude.to_bits(),
        to.latitude.to_bits(),
        to.longitude.to_bits(),
    )
}

/// Routing provider with a shared distance table.
///
/// Only `distance_duration` is cached; directions pass straight through.
pub struct CachedRouting<P> {
    inner: P,
    pairs: MokaCache<PairKey, RouteSummary>,
}

impl<P: RoutingProvider> CachedRouting<P> {
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        let pairs = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, pairs }
    }

    /// Access the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Get cache statistics (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.pairs.entry_count()
    }
}

impl<P: RoutingProvider> RoutingProvider for CachedRouting<P> {
    async fn distance_duration(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        let key = pair_key(from, to);

        if let Some(cached) = self.pairs.get(&key).await {
            return Ok(cached);
        }

        let summary = self.inner.distance_duration(from, to).await?;
        self.pairs.insert(key, summary).await;

        Ok(summary)
    }

    async fn turn_by_turn(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<TurnByTurn, RoutingError> {
        self.inner.turn_by_turn(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers every pair with the same summary, or fails, counting calls.
    struct CountingProvider {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(0),
                fail,
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl RoutingProvider for CountingProvider {
        async fn distance_duration(
            &self,
            _from: Coordinate,
            _to: Coordinate,
        ) -> Result<RouteSummary, RoutingError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(RoutingError::Api {
                    status: 503,
                    message: "down".into(),
                });
            }
            Ok(RouteSummary {
                distance_meters: 1609.34,
                duration_seconds: 120.0,
            })
        }

        async fn turn_by_turn(
            &self,
            from: Coordinate,
            _to: Coordinate,
        ) -> Result<TurnByTurn, RoutingError> {
            *self.calls.lock().unwrap() += 1;
            Err(RoutingError::NoRoute { from, to: from })
        }
    }

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_capacity, 50_000);
    }

    #[test]
    fn key_is_directional() {
        let a = c(40.0, -74.0);
        let b = c(40.1, -74.1);
        assert_ne!(pair_key(a, b), pair_key(b, a));
        assert_eq!(pair_key(a, b), pair_key(c(40.0, -74.0), c(40.1, -74.1)));
    }

    #[tokio::test]
    async fn repeated_lookup_hits_cache() {
        let cached = CachedRouting::new(CountingProvider::new(false), &CacheConfig::default());
        let (a, b) = (c(40.0, -74.0), c(40.1, -74.1));

        let first = cached.distance_duration(a, b).await.unwrap();
        let second = cached.distance_duration(a, b).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().call_count(), 1);

        // Reverse direction is a separate entry
        cached.distance_duration(b, a).await.unwrap();
        assert_eq!(cached.inner().call_count(), 2);

        cached.pairs.run_pending_tasks().await;
        assert_eq!(cached.entry_count(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedRouting::new(CountingProvider::new(true), &CacheConfig::default());
        let (a, b) = (c(40.0, -74.0), c(40.1, -74.1));

        assert!(cached.distance_duration(a, b).await.is_err());
        assert!(cached.distance_duration(a, b).await.is_err());
        assert_eq!(cached.inner().call_count(), 2);
    }

    #[tokio::test]
    async fn directions_pass_through() {
        let cached = CachedRouting::new(CountingProvider::new(false), &CacheConfig::default());
        let a = c(40.0, -74.0);

        assert!(cached.turn_by_turn(a, a).await.is_err());
        assert!(cached.turn_by_turn(a, a).await.is_err());
        assert_eq!(cached.inner().call_count(), 2);
    }
}
