//! Data model for construction traces and steps.
//!
//! A trace is append-only while its request runs and immutable once
//! finalized. Step order equals causal execution order — the orchestrator
//! is the single writer; concurrent sub-tasks return their results and
//! never touch the step list directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Baseline against which the speed score is computed, in milliseconds.
const SPEED_BASELINE_MS: f64 = 5_000.0;

/// The pipeline stages, in causal order. Used to mark not-started stages
/// when a request dies mid-pipeline.
pub const PIPELINE_STAGES: [&str; 5] = [
    "analyze_context",
    "retrieve_metadata",
    "select_template",
    "assemble_context",
    "render_prompt",
];

/// One recorded pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionStep {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Per-step confidence in [0, 1].
    pub confidence: f32,
    pub success: bool,
    /// Free-form structured payload (selected tables, dropped sections…).
    #[serde(default)]
    pub detail: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConstructionStep {
    /// A marker for a stage the request never reached.
    pub fn not_started(name: &str, at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            started_at: at,
            ended_at: at,
            duration_ms: 0,
            confidence: 0.0,
            success: false,
            detail: serde_json::json!({ "not_started": true }),
            error: None,
        }
    }

    fn was_started(&self) -> bool {
        self.detail.get("not_started").is_none()
    }
}

/// The finished, request-scoped construction trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionTrace {
    /// Unique trace id, also used as the cache key for `ExplainConstruction`.
    pub id: String,
    /// The original question, kept for rationale rendering.
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Steps in causal execution order.
    pub steps: Vec<ConstructionStep>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Mean of step confidences, set at finalization.
    pub overall_confidence: f32,
    /// `0.6·speed + 0.4·success_ratio`, set at finalization.
    pub efficiency_score: f32,
}

impl ConstructionTrace {
    pub fn new(question: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            user_id,
            steps: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            overall_confidence: 0.0,
            efficiency_score: 0.0,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Append a step. Single-writer: only the orchestrator calls this.
    pub fn append(&mut self, step: ConstructionStep) {
        debug_assert!(!self.is_finalized(), "append to finalized trace");
        self.steps.push(step);
    }

    /// Total wall-clock duration across recorded steps.
    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }

    /// Share of started steps that succeeded, in [0, 1].
    pub fn success_ratio(&self) -> f32 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let succeeded = self.steps.iter().filter(|s| s.success).count();
        succeeded as f32 / self.steps.len() as f32
    }

    /// `max(0, 1 − totalDurationMs / 5000)` against the fixed baseline.
    pub fn speed_score(&self) -> f32 {
        (1.0 - self.total_duration_ms() as f64 / SPEED_BASELINE_MS).max(0.0) as f32
    }

    /// Freeze the trace: compute overall scores and stamp the end time.
    /// Idempotent — a second call is a no-op.
    pub fn finalize(&mut self) {
        if self.is_finalized() {
            return;
        }
        let started = self.steps.iter().filter(|s| s.was_started()).count();
        self.overall_confidence = if started == 0 {
            0.0
        } else {
            self.steps
                .iter()
                .filter(|s| s.was_started())
                .map(|s| s.confidence)
                .sum::<f32>()
                / started as f32
        };
        self.efficiency_score = 0.6 * self.speed_score() + 0.4 * self.success_ratio();
        self.ended_at = Some(Utc::now());
    }
}
