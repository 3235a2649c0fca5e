//! Construction tracing for PromptForge.
//!
//! Every pipeline stage is wrapped by a `TraceRecorder`; the finished
//! `ConstructionTrace` carries an ordered, timestamped record of every
//! decision for one request — the raw material for `ExplainConstruction`
//! and for reporting/analytics consumers. Traces are append-only while
//! the request runs, immutable after finalization, and handed off exactly
//! once to the external store and the short-lived trace cache.

pub mod metrics;
pub mod model;
pub mod recorder;
pub mod store;

pub use metrics::RequestMetrics;
pub use model::{ConstructionStep, ConstructionTrace, PIPELINE_STAGES};
pub use recorder::{StepGuard, TraceRecorder, publish_trace};
pub use store::{InMemoryTraceStore, TraceStore};
