//! The construction tracer — wraps every pipeline stage.
//!
//! The recorder is owned by the orchestrating task and is the only writer
//! of the step list. Concurrent sub-tasks return their results; the
//! orchestrator converts them to steps and appends. On an unhandled error
//! the recorder still emits a best-effort trace: completed steps as
//! recorded, remaining stages marked not-started, plus one synthetic
//! "error" step. Finished traces are handed off exactly once.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use promptforge_core::cache::Cache;

use crate::metrics::RequestMetrics;
use crate::model::{ConstructionStep, ConstructionTrace, PIPELINE_STAGES};
use crate::store::TraceStore;

/// An in-flight step, created when a stage begins.
pub struct StepGuard {
    name: &'static str,
    started_at: DateTime<Utc>,
    started_instant: Instant,
}

/// Records steps for one construction request.
pub struct TraceRecorder {
    trace: ConstructionTrace,
    metrics: RequestMetrics,
}

impl TraceRecorder {
    pub fn new(question: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            trace: ConstructionTrace::new(question, user_id),
            metrics: RequestMetrics::default(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace.id
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Begin timing a stage.
    pub fn begin(&self, name: &'static str) -> StepGuard {
        debug!(stage = name, trace_id = %self.trace.id, "stage started");
        StepGuard {
            name,
            started_at: Utc::now(),
            started_instant: Instant::now(),
        }
    }

    /// Record a successfully completed stage.
    pub fn complete(&mut self, guard: StepGuard, confidence: f32, detail: serde_json::Value) {
        self.end_step(guard, confidence, true, detail, None);
    }

    /// Record a failed stage. Failure here means the *stage* did not
    /// deliver — the pipeline may still continue degraded.
    pub fn fail(
        &mut self,
        guard: StepGuard,
        confidence: f32,
        detail: serde_json::Value,
        error: impl Into<String>,
    ) {
        self.end_step(guard, confidence, false, detail, Some(error.into()));
    }

    fn end_step(
        &mut self,
        guard: StepGuard,
        confidence: f32,
        success: bool,
        detail: serde_json::Value,
        error: Option<String>,
    ) {
        let duration_ms = guard.started_instant.elapsed().as_millis() as u64;
        self.metrics.record_stage(guard.name, duration_ms, success);
        if !success {
            warn!(stage = guard.name, trace_id = %self.trace.id, ?error, "stage failed");
        }
        self.trace.append(ConstructionStep {
            name: guard.name.to_string(),
            started_at: guard.started_at,
            ended_at: Utc::now(),
            duration_ms,
            confidence: confidence.clamp(0.0, 1.0),
            success,
            detail,
            error,
        });
    }

    /// Finalize after normal completion (successful or terminal-failure).
    pub fn finish(mut self) -> (ConstructionTrace, RequestMetrics) {
        self.trace.finalize();
        (self.trace, self.metrics)
    }

    /// Finalize after an unhandled mid-pipeline error: mark every stage the
    /// request never reached as not-started and append one synthetic error
    /// step. The caller always gets a usable trace, never an empty one.
    pub fn finish_aborted(mut self, error: impl Into<String>) -> (ConstructionTrace, RequestMetrics) {
        let now = Utc::now();
        let recorded: Vec<String> = self.trace.steps.iter().map(|s| s.name.clone()).collect();
        for stage in PIPELINE_STAGES {
            if !recorded.iter().any(|r| r == stage) {
                self.trace.append(ConstructionStep::not_started(stage, now));
            }
        }
        self.trace.append(ConstructionStep {
            name: "error".into(),
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            confidence: 0.0,
            success: false,
            detail: serde_json::Value::Null,
            error: Some(error.into()),
        });
        self.trace.finalize();
        (self.trace, self.metrics)
    }
}

/// Hand a finalized trace to the append-only store and the short-lived
/// trace cache. Called exactly once per request; store rejection is logged
/// and swallowed — trace persistence never fails a request that already
/// produced its result.
pub async fn publish_trace(
    trace: &ConstructionTrace,
    store: &Arc<dyn TraceStore>,
    cache: &Arc<dyn Cache<ConstructionTrace>>,
    cache_ttl: Duration,
) {
    if let Err(e) = store.record(trace.clone()).await {
        warn!(trace_id = %trace.id, error = %e, "trace store rejected record");
    }
    cache.put(&trace.id, trace.clone(), cache_ttl).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTraceStore;
    use promptforge_core::cache::InMemoryTtlCache;

    #[tokio::test]
    async fn records_steps_in_order() {
        let mut recorder = TraceRecorder::new("q", None);
        let g = recorder.begin("analyze_context");
        recorder.complete(g, 0.9, serde_json::json!({"entities": 2}));
        let g = recorder.begin("retrieve_metadata");
        recorder.fail(g, 0.2, serde_json::Value::Null, "store down");

        let (trace, _) = recorder.finish();
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[0].name, "analyze_context");
        assert!(trace.steps[0].success);
        assert_eq!(trace.steps[1].name, "retrieve_metadata");
        assert!(!trace.steps[1].success);
        assert_eq!(trace.steps[1].error.as_deref(), Some("store down"));
        assert!(trace.is_finalized());
    }

    #[tokio::test]
    async fn aborted_trace_marks_remaining_stages() {
        let mut recorder = TraceRecorder::new("q", None);
        let g = recorder.begin("analyze_context");
        recorder.complete(g, 0.8, serde_json::Value::Null);

        let (trace, _) = recorder.finish_aborted("panic in retrieval");
        // 1 completed + 4 not-started + 1 synthetic error
        assert_eq!(trace.steps.len(), 6);
        let error_step = trace.steps.last().unwrap();
        assert_eq!(error_step.name, "error");
        assert_eq!(error_step.error.as_deref(), Some("panic in retrieval"));
        let not_started = trace
            .steps
            .iter()
            .filter(|s| s.detail.get("not_started").is_some())
            .count();
        assert_eq!(not_started, 4);
    }

    #[tokio::test]
    async fn confidence_is_clamped() {
        let mut recorder = TraceRecorder::new("q", None);
        let g = recorder.begin("analyze_context");
        recorder.complete(g, 1.7, serde_json::Value::Null);
        let (trace, _) = recorder.finish();
        assert_eq!(trace.steps[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn publish_reaches_store_and_cache() {
        let store: Arc<InMemoryTraceStore> = Arc::new(InMemoryTraceStore::new());
        let store_dyn: Arc<dyn TraceStore> = store.clone();
        let cache: Arc<dyn Cache<ConstructionTrace>> = Arc::new(InMemoryTtlCache::new());

        let (trace, _) = TraceRecorder::new("q", None).finish();
        publish_trace(&trace, &store_dyn, &cache, Duration::from_secs(60)).await;

        assert_eq!(store.len().await, 1);
        assert!(cache.get(&trace.id).await.is_some());
    }
}
