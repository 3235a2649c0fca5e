//! Trace store trait and the in-memory append-only implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;

use promptforge_core::error::TraceError;

use crate::model::ConstructionTrace;

/// The external append-only trace store. A finalized trace is recorded
/// exactly once and never updated.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// The store name (e.g. "clickhouse", "in_memory").
    fn name(&self) -> &str;

    /// Append a finalized trace.
    async fn record(&self, trace: ConstructionTrace) -> std::result::Result<(), TraceError>;

    /// Fetch a trace by id.
    async fn get(&self, trace_id: &str)
    -> std::result::Result<Option<ConstructionTrace>, TraceError>;
}

/// In-memory store — useful for tests and ephemeral deployments.
pub struct InMemoryTraceStore {
    traces: RwLock<Vec<ConstructionTrace>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.traces.read().await.len()
    }
}

impl Default for InMemoryTraceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn record(&self, trace: ConstructionTrace) -> std::result::Result<(), TraceError> {
        if !trace.is_finalized() {
            return Err(TraceError::StoreRejected(format!(
                "trace {} is not finalized",
                trace.id
            )));
        }
        let mut traces = self.traces.write().await;
        if traces.iter().any(|t| t.id == trace.id) {
            return Err(TraceError::AlreadyFinalized(trace.id));
        }
        traces.push(trace);
        Ok(())
    }

    async fn get(
        &self,
        trace_id: &str,
    ) -> std::result::Result<Option<ConstructionTrace>, TraceError> {
        Ok(self
            .traces
            .read()
            .await
            .iter()
            .find(|t| t.id == trace_id)
            .cloned())
    }
}
