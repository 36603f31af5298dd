//! Process-wide caches
//!
//! Two caches with the same `get/set/has/delete/clear` contract:
//! - `GeologyScoreCache`: geology scores keyed by coordinates rounded to
//!   4 decimals, no expiry unless configured
//! - `GeospatialCache`: provider responses keyed by URL + params, per-entry TTL
//!
//! Cache law: after `set(k, v, ttl)` and before `ttl` elapses, `get(k) == v`;
//! afterwards `get(k)` is `None`.

mod geology;
mod geospatial;

pub use geology::{CoordKey, GeologyScoreCache};
pub use geospatial::{cache_key, CacheCategory, GeospatialCache};

use async_trait::async_trait;
use std::time::Duration;

/// Shared contract of the engine caches.
#[async_trait]
pub trait KeyValueCache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Value for `key` if present and not expired.
    async fn get(&self, key: &K) -> Option<V>;

    /// Insert or replace. `ttl = None` uses the cache's default lifetime.
    async fn set(&self, key: K, value: V, ttl: Option<Duration>);

    async fn has(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }

    /// Remove an entry, returning whether it existed.
    async fn delete(&self, key: &K) -> bool;

    async fn clear(&self);

    /// Number of stored entries, expired ones included until swept.
    async fn len(&self) -> usize;
}
