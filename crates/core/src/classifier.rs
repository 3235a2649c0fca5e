//! Text classifier trait — the abstraction over the external
//! classification / LLM collaborator used by the Context Analyzer.
//!
//! Text goes in, structured hypotheses with confidences come out. Retries
//! against transient failures belong to the implementation behind this
//! trait; the analyzer only reacts to an exhausted signal by falling back
//! to its rule-based classifiers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::AnalysisError;

/// What the classifier is being asked to label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationTask {
    Intent,
    Domain,
    Entities,
}

/// A classification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub task: ClassificationTask,
    /// The question text.
    pub text: String,
    /// Candidate labels the classifier should choose among (intents or
    /// domain names). Empty for open-ended tasks like entity tagging.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// One labeled hypothesis with its confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub label: String,
    /// Normalized confidence in [0, 1].
    pub confidence: f32,
    /// Byte span in the input text, for entity hypotheses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
}

/// The external text-classification collaborator.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// A human-readable name for this classifier.
    fn name(&self) -> &str;

    /// Classify `request.text`, strongest hypothesis first.
    ///
    /// An `Err` or a deadline overrun means "exhausted" — the analyzer
    /// substitutes its rule-based fallback and lowers confidence; the
    /// failure is never propagated to the caller.
    async fn classify(
        &self,
        request: ClassificationRequest,
        deadline: Deadline,
    ) -> std::result::Result<Vec<Hypothesis>, AnalysisError>;
}
