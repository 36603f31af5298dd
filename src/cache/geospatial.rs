//! TTL cache for geospatial provider responses
//!
//! Entries expire lazily on read and are swept by an optional background task.

use super::KeyValueCache;
use crate::config::CacheConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Response categories with their own lifetimes.
///
/// The engine's own providers use `Default`. `Flood`, `Roads` and `Country`
/// are for `AccessibilityAnalyzer` implementations sharing the global cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    /// Elevation, lithology, features and other provider payloads
    Default,
    /// Flood-risk lookups
    Flood,
    /// Road-network distance queries
    Roads,
    /// Reverse-geocoded country
    Country,
}

impl CacheCategory {
    pub fn ttl(self, config: &CacheConfig) -> Duration {
        Duration::from_millis(match self {
            Self::Default => config.geospatial_ttl_ms,
            Self::Flood => config.flood_ttl_ms,
            Self::Roads => config.roads_ttl_ms,
            Self::Country => config.country_ttl_ms,
        })
    }
}

/// Stable cache key for a request: URL plus query params sorted by name.
pub fn cache_key(url: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));
    let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{url}?{}", query.join("&"))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Shared response cache. Eviction is by TTL only.
#[derive(Debug)]
pub struct GeospatialCache {
    store: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

static GLOBAL_GEOSPATIAL_CACHE: OnceLock<Arc<GeospatialCache>> = OnceLock::new();

impl GeospatialCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(CacheCategory::Default.ttl(config))
    }

    /// The process-wide instance shared by every request.
    pub fn global() -> Arc<Self> {
        GLOBAL_GEOSPATIAL_CACHE
            .get_or_init(|| Arc::new(Self::from_config(&crate::config::current().cache)))
            .clone()
    }

    /// Store `value` under the lifetime configured for `category`.
    pub async fn set_in(&self, category: CacheCategory, config: &CacheConfig, key: String, value: serde_json::Value) {
        self.set(key, value, Some(category.ttl(config))).await;
    }

    /// Remove all expired entries, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired());
        let removed = before - store.len();
        drop(store);
        if removed > 0 {
            debug!(removed, "Cleaned up expired geospatial cache entries");
        }
        removed
    }

    /// Spawn a periodic sweep. The task ends once the cache is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    debug!("Geospatial cache dropped, stopping cleanup task");
                    break;
                };
                cache.cleanup_expired().await;
            }
        })
    }
}

#[async_trait]
impl KeyValueCache<String, serde_json::Value> for GeospatialCache {
    async fn get(&self, key: &String) -> Option<serde_json::Value> {
        {
            let store = self.store.read().await;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut store = self.store.write().await;
        if store.get(key).is_some_and(CacheEntry::is_expired) {
            store.remove(key);
        }
        None
    }

    async fn set(&self, key: String, value: serde_json::Value, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.store
            .write()
            .await
            .insert(key, CacheEntry { value, expires_at });
    }

    async fn delete(&self, key: &String) -> bool {
        self.store.write().await.remove(key).is_some()
    }

    async fn clear(&self) {
        self.store.write().await.clear();
    }

    async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = cache_key("https://x/api", &[("lat", "1".into()), ("lon", "2".into())]);
        let b = cache_key("https://x/api", &[("lon", "2".into()), ("lat", "1".into())]);
        assert_eq!(a, b);
        assert_eq!(a, "https://x/api?lat=1&lon=2");
    }

    #[test]
    fn test_category_ttls() {
        let config = CacheConfig::default();
        assert_eq!(CacheCategory::Flood.ttl(&config), Duration::from_secs(3600));
        assert_eq!(CacheCategory::Roads.ttl(&config), Duration::from_secs(1800));
        assert_eq!(CacheCategory::Country.ttl(&config), Duration::from_secs(86_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_law() {
        let cache = GeospatialCache::new(Duration::from_secs(60));
        let key = "k".to_string();
        cache.set(key.clone(), json!({"v": 1}), Some(Duration::from_millis(500))).await;

        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(cache.get(&key).await, Some(json!({"v": 1})));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.len().await, 0, "expired entry removed on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_categories_expire_independently() {
        let config = CacheConfig::default();
        let cache = GeospatialCache::from_config(&config);
        cache.set_in(CacheCategory::Roads, &config, "roads".into(), json!(3.2)).await;
        cache.set_in(CacheCategory::Flood, &config, "flood".into(), json!("low")).await;
        cache.set_in(CacheCategory::Country, &config, "country".into(), json!("ZW")).await;

        tokio::time::advance(Duration::from_secs(1_801)).await;
        assert_eq!(cache.get(&"roads".to_string()).await, None);
        assert_eq!(cache.get(&"flood".to_string()).await, Some(json!("low")));

        tokio::time::advance(Duration::from_secs(1_800)).await;
        assert_eq!(cache.get(&"flood".to_string()).await, None);
        assert_eq!(cache.get(&"country".to_string()).await, Some(json!("ZW")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep() {
        let cache = Arc::new(GeospatialCache::new(Duration::from_secs(1)));
        cache.set("a".into(), json!(1), None).await;
        cache.set("b".into(), json!(2), Some(Duration::from_secs(600))).await;
        let handle = cache.spawn_cleanup(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.has(&"b".to_string()).await);

        drop(cache);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = GeospatialCache::new(Duration::from_secs(60));
        cache.set("a".into(), json!(1), None).await;
        cache.set("b".into(), json!(2), None).await;
        assert!(cache.delete(&"a".to_string()).await);
        assert!(!cache.delete(&"a".to_string()).await);
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
