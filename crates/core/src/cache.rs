//! Generic TTL cache trait and the default in-memory implementation.
//!
//! Shared caches (schema retrieval, finished traces) support concurrent
//! reads with insert-if-absent writes and are evicted by TTL in the common
//! case. Explicit invalidation is driven by an external schema-change
//! notification, not by manual cache-busting in the pipeline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A get/put cache with per-entry TTL.
#[async_trait]
pub trait Cache<V: Clone + Send + Sync + 'static>: Send + Sync {
    /// Fetch a live entry. Expired entries behave as absent.
    async fn get(&self, key: &str) -> Option<V>;

    /// Insert-if-absent. An existing live entry wins; expired entries are
    /// replaced.
    async fn put(&self, key: &str, value: V, ttl: Duration);

    /// Drop a single entry.
    async fn invalidate(&self, key: &str);

    /// Drop everything.
    async fn clear(&self);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory TTL cache. Expiry is lazy: entries are checked on read and
/// swept opportunistically on write.
pub struct InMemoryTtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> InMemoryTtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for InMemoryTtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> Cache<V> for InMemoryTtlCache<V> {
    async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    async fn put(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.entry(key.to_string()).or_insert(Entry {
            value,
            expires_at: now + ttl,
        });
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_live_entry() {
        let cache = InMemoryTtlCache::new();
        cache.put("k", 42_u32, Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(42));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_behave_as_absent() {
        let cache = InMemoryTtlCache::new();
        cache.put("k", 1_u32, Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn put_is_insert_if_absent() {
        let cache = InMemoryTtlCache::new();
        cache.put("k", 1_u32, Duration::from_secs(60)).await;
        cache.put("k", 2_u32, Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn put_replaces_expired_entry() {
        let cache = InMemoryTtlCache::new();
        cache.put("k", 1_u32, Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put("k", 2_u32, Duration::from_secs(10)).await;
        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = InMemoryTtlCache::new();
        cache.put("a", 1_u32, Duration::from_secs(60)).await;
        cache.put("b", 2_u32, Duration::from_secs(60)).await;
        cache.invalidate("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(2));
        cache.clear().await;
        assert_eq!(cache.get("b").await, None);
    }
}
