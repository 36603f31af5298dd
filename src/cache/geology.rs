//! Geology score cache keyed by rounded coordinates

use super::KeyValueCache;
use crate::config::defaults::GEOLOGY_CACHE_PRECISION;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// `(lat, lon)` rounded to 4 decimals, held as scaled integers so equal
/// roundings hash identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl CoordKey {
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(lat: f64, lon: f64) -> Self {
        let scale = 10f64.powi(GEOLOGY_CACHE_PRECISION);
        Self {
            lat_e4: (lat * scale).round() as i64,
            lon_e4: (lon * scale).round() as i64,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat_e4 as f64 / 10f64.powi(GEOLOGY_CACHE_PRECISION)
    }

    pub fn lon(&self) -> f64 {
        self.lon_e4 as f64 / 10f64.powi(GEOLOGY_CACHE_PRECISION)
    }
}

impl std::fmt::Display for CoordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat(), self.lon())
    }
}

#[derive(Debug, Clone, Copy)]
struct ScoreEntry {
    score: f64,
    expires_at: Option<Instant>,
}

impl ScoreEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

/// Concurrent geology score cache. Entries never expire unless a default
/// TTL is configured or one is passed to `set`.
#[derive(Debug, Default)]
pub struct GeologyScoreCache {
    scores: DashMap<CoordKey, ScoreEntry>,
    default_ttl: Option<Duration>,
}

static GLOBAL_GEOLOGY_CACHE: OnceLock<Arc<GeologyScoreCache>> = OnceLock::new();

impl GeologyScoreCache {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            scores: DashMap::new(),
            default_ttl,
        }
    }

    /// The process-wide instance shared by every request.
    pub fn global() -> Arc<Self> {
        GLOBAL_GEOLOGY_CACHE
            .get_or_init(|| {
                let ttl = crate::config::current()
                    .cache
                    .geology_ttl_ms
                    .map(Duration::from_millis);
                Arc::new(Self::new(ttl))
            })
            .clone()
    }
}

#[async_trait]
impl KeyValueCache<CoordKey, f64> for GeologyScoreCache {
    async fn get(&self, key: &CoordKey) -> Option<f64> {
        let entry = self.scores.get(key).map(|e| *e)?;
        if entry.is_expired() {
            self.scores.remove(key);
            debug!(key = %key, "Geology cache entry expired");
            return None;
        }
        Some(entry.score)
    }

    async fn set(&self, key: CoordKey, value: f64, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|t| Instant::now() + t);
        self.scores.insert(key, ScoreEntry { score: value, expires_at });
    }

    async fn delete(&self, key: &CoordKey) -> bool {
        self.scores.remove(key).is_some()
    }

    async fn clear(&self) {
        self.scores.clear();
    }

    async fn len(&self) -> usize {
        self.scores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_coordinates_share_key() {
        let a = CoordKey::new(-17.8292, 31.0522);
        let b = CoordKey::new(-17.82923, 31.05217);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(-17.8292, 31.0522)");
    }

    #[test]
    fn test_distinct_at_fourth_decimal() {
        assert_ne!(CoordKey::new(-17.8292, 31.0522), CoordKey::new(-17.8293, 31.0522));
    }

    #[tokio::test]
    async fn test_hit_returns_exact_value() {
        let cache = GeologyScoreCache::new(None);
        let key = CoordKey::new(1.0, 2.0);
        cache.set(key, 0.612_345_678_9, None).await;
        assert_eq!(cache.get(&key).await, Some(0.612_345_678_9));
        assert!(cache.has(&key).await);
        assert!(cache.delete(&key).await);
        assert!(!cache.has(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_ttl_expires() {
        let cache = GeologyScoreCache::new(Some(Duration::from_secs(10)));
        let key = CoordKey::new(1.0, 2.0);
        cache.set(key, 0.5, None).await;
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&key).await, Some(0.5));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.len().await, 0);
    }
}
