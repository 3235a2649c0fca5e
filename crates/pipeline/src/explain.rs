//! `ExplainConstruction` — a rationale breakdown rendered from the trace.
//!
//! Reads the short-lived trace cache first and falls back to the
//! append-only store, so explanations survive cache eviction for as long
//! as the store keeps the trace.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use promptforge_core::cache::Cache;
use promptforge_core::error::{Result, TraceError};
use promptforge_trace::{ConstructionStep, ConstructionTrace, TraceStore};

/// Per-step rationale for transparency tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRationale {
    pub stage: String,
    pub success: bool,
    pub confidence: f32,
    pub duration_ms: u64,
    /// Human-readable summary of what the stage decided.
    pub summary: String,
}

/// The full rationale breakdown for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub trace_id: String,
    pub question: String,
    pub overall_confidence: f32,
    pub efficiency_score: f32,
    pub steps: Vec<StepRationale>,
}

impl Explanation {
    /// Render the explanation as readable text.
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Construction {} — \"{}\"\nconfidence {:.2}, efficiency {:.2}\n",
            self.trace_id, self.question, self.overall_confidence, self.efficiency_score
        );
        for step in &self.steps {
            let mark = if step.success { "ok" } else { "FAILED" };
            out.push_str(&format!(
                "  [{mark}] {} ({} ms, confidence {:.2}): {}\n",
                step.stage, step.duration_ms, step.confidence, step.summary
            ));
        }
        out
    }
}

/// Read side of the tracer: turns a stored trace into a rationale.
pub struct ConstructionExplainer {
    cache: Arc<dyn Cache<ConstructionTrace>>,
    store: Arc<dyn TraceStore>,
}

impl ConstructionExplainer {
    pub fn new(cache: Arc<dyn Cache<ConstructionTrace>>, store: Arc<dyn TraceStore>) -> Self {
        Self { cache, store }
    }

    /// Explain a finished construction by trace id.
    pub async fn explain(&self, trace_id: &str) -> Result<Explanation> {
        let trace = match self.cache.get(trace_id).await {
            Some(trace) => trace,
            None => self
                .store
                .get(trace_id)
                .await?
                .ok_or_else(|| TraceError::NotFound(trace_id.to_string()))?,
        };

        Ok(Explanation {
            trace_id: trace.id.clone(),
            question: trace.question.clone(),
            overall_confidence: trace.overall_confidence,
            efficiency_score: trace.efficiency_score,
            steps: trace.steps.iter().map(step_rationale).collect(),
        })
    }
}

fn step_rationale(step: &ConstructionStep) -> StepRationale {
    StepRationale {
        stage: step.name.clone(),
        success: step.success,
        confidence: step.confidence,
        duration_ms: step.duration_ms,
        summary: summarize(step),
    }
}

/// Build the one-line summary from the step's structured detail.
fn summarize(step: &ConstructionStep) -> String {
    if let Some(error) = &step.error {
        return format!("error: {error}");
    }
    if step.detail.get("not_started").is_some() {
        return "not started".into();
    }

    let d = &step.detail;
    match step.name.as_str() {
        "analyze_context" => format!(
            "intent {}, domain {}, {} entities{}",
            d["intent"].as_str().unwrap_or("?"),
            d["domain"].as_str().unwrap_or("?"),
            d["entities"].as_u64().unwrap_or(0),
            if d["degraded"].as_bool().unwrap_or(false) {
                " (fallback classification)"
            } else {
                ""
            }
        ),
        "retrieve_metadata" => format!(
            "{} tables ({}){}",
            d["tables"].as_array().map(Vec::len).unwrap_or(0),
            d["outcome"].as_str().unwrap_or("?"),
            if d["cache_hit"].as_bool().unwrap_or(false) {
                ", from cache"
            } else {
                ""
            }
        ),
        "select_template" => format!(
            "template {} ({})",
            d["template"].as_str().unwrap_or("?"),
            d["origin"].as_str().unwrap_or("?")
        ),
        "assemble_context" => format!(
            "{} of {} sections, {} tokens of {} budget",
            d["selected"].as_array().map(Vec::len).unwrap_or(0),
            d["considered"].as_u64().unwrap_or(0),
            d["total_tokens"].as_u64().unwrap_or(0),
            d["budget_tokens"].as_u64().unwrap_or(0)
        ),
        "render_prompt" => format!(
            "{} tokens, {} examples",
            d["token_count"].as_u64().unwrap_or(0),
            d["examples"].as_u64().unwrap_or(0)
        ),
        other => format!("{other} completed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptforge_core::cache::InMemoryTtlCache;
    use promptforge_trace::InMemoryTraceStore;
    use serde_json::json;
    use std::time::Duration;

    fn sample_trace() -> ConstructionTrace {
        let mut trace = ConstructionTrace::new("total deposits", None);
        let now = Utc::now();
        trace.append(ConstructionStep {
            name: "analyze_context".into(),
            started_at: now,
            ended_at: now,
            duration_ms: 12,
            confidence: 0.8,
            success: true,
            detail: json!({"intent": "aggregation", "domain": "banking", "entities": 2, "degraded": false}),
            error: None,
        });
        trace.append(ConstructionStep {
            name: "retrieve_metadata".into(),
            started_at: now,
            ended_at: now,
            duration_ms: 30,
            confidence: 0.7,
            success: true,
            detail: json!({"tables": ["tbl_transactions"], "outcome": "complete", "cache_hit": false}),
            error: None,
        });
        trace.finalize();
        trace
    }

    #[tokio::test]
    async fn explains_from_cache() {
        let cache: Arc<dyn Cache<ConstructionTrace>> = Arc::new(InMemoryTtlCache::new());
        let store = Arc::new(InMemoryTraceStore::new());
        let trace = sample_trace();
        cache.put(&trace.id, trace.clone(), Duration::from_secs(60)).await;

        let explainer = ConstructionExplainer::new(cache, store);
        let explanation = explainer.explain(&trace.id).await.unwrap();
        assert_eq!(explanation.steps.len(), 2);
        assert!(explanation.steps[0].summary.contains("aggregation"));
        assert!(explanation.steps[1].summary.contains("1 tables"));
    }

    #[tokio::test]
    async fn falls_back_to_store() {
        let cache: Arc<dyn Cache<ConstructionTrace>> = Arc::new(InMemoryTtlCache::new());
        let store = Arc::new(InMemoryTraceStore::new());
        let trace = sample_trace();
        store.record(trace.clone()).await.unwrap();

        let explainer = ConstructionExplainer::new(cache, store);
        let explanation = explainer.explain(&trace.id).await.unwrap();
        assert_eq!(explanation.trace_id, trace.id);
    }

    #[tokio::test]
    async fn unknown_trace_is_not_found() {
        let cache: Arc<dyn Cache<ConstructionTrace>> = Arc::new(InMemoryTtlCache::new());
        let store = Arc::new(InMemoryTraceStore::new());
        let explainer = ConstructionExplainer::new(cache, store);
        let err = explainer.explain("missing").await.unwrap_err();
        assert!(matches!(
            err,
            promptforge_core::Error::Trace(TraceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn render_text_lists_every_step() {
        let cache: Arc<dyn Cache<ConstructionTrace>> = Arc::new(InMemoryTtlCache::new());
        let store = Arc::new(InMemoryTraceStore::new());
        let trace = sample_trace();
        store.record(trace.clone()).await.unwrap();

        let explainer = ConstructionExplainer::new(cache, store);
        let text = explainer.explain(&trace.id).await.unwrap().render_text();
        assert!(text.contains("analyze_context"));
        assert!(text.contains("retrieve_metadata"));
        assert!(text.contains("[ok]"));
    }
}
