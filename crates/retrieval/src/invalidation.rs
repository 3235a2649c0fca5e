//! Schema-change invalidation.
//!
//! The surrounding system notifies this core over an mpsc channel when the
//! catalog changes; cached retrieval results are dropped wholesale. TTL
//! remains the common-case eviction — this path exists for correctness
//! after migrations, not for routine freshness.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use promptforge_core::cache::Cache;
use promptforge_core::metadata::SchemaChange;
use promptforge_core::schema::ContextualSchema;

/// Consume schema-change notifications until the sender side closes.
///
/// Retrieval entries are keyed by question hash, not by table, so any
/// change clears the whole cache.
pub fn spawn_invalidator(
    mut notifications: mpsc::Receiver<SchemaChange>,
    cache: Arc<dyn Cache<ContextualSchema>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = notifications.recv().await {
            info!(?change, "schema changed, clearing retrieval cache");
            cache.clear().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_core::cache::InMemoryTtlCache;
    use std::time::Duration;

    #[tokio::test]
    async fn notification_clears_cache() {
        let cache: Arc<dyn Cache<ContextualSchema>> = Arc::new(InMemoryTtlCache::new());
        cache
            .put("key", ContextualSchema::empty(), Duration::from_secs(600))
            .await;

        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_invalidator(rx, cache.clone());

        tx.send(SchemaChange::Table("tbl_transactions".into()))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn invalidator_stops_when_sender_drops() {
        let cache: Arc<dyn Cache<ContextualSchema>> = Arc::new(InMemoryTtlCache::new());
        let (tx, rx) = mpsc::channel::<SchemaChange>(1);
        let handle = spawn_invalidator(rx, cache);
        drop(tx);
        handle.await.unwrap();
    }
}
