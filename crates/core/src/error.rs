//! Error types for the PromptForge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Recoverable degradations (fallback classification, partial retrieval,
//! empty retrieval) are **not** errors — they are carried as values on the
//! stage result types and lower the request's confidence. Only conditions
//! that stop the pipeline surface here.

use thiserror::Error;

/// The top-level error type for all PromptForge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Analyzer errors ---
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Assembly errors ---
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Trace errors ---
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Classifier rejected request: {0}")]
    ClassifierRejected(String),

    #[error("Question is empty")]
    EmptyQuestion,
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Metadata store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Relationship discovery failed: {0}")]
    RelationshipFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    /// Internal invariant violated — should never occur under correct
    /// configuration.
    #[error("Assembly invariant violated: {0}")]
    InvariantViolated(String),

    #[error(
        "Token budget is negative: max {max_prompt_tokens} − template {template_overhead} − reserved {reserved_response_tokens}"
    )]
    NegativeBudget {
        max_prompt_tokens: usize,
        template_overhead: usize,
        reserved_response_tokens: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("Template repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Template '{id}' is missing required slot {slot}")]
    MissingSlot { id: String, slot: String },
}

#[derive(Debug, Clone, Error)]
pub enum TraceError {
    #[error("Trace store rejected record: {0}")]
    StoreRejected(String),

    #[error("Trace not found: {0}")]
    NotFound(String),

    #[error("Trace already finalized: {0}")]
    AlreadyFinalized(String),
}

/// Terminal, structured failures returned to the caller alongside the
/// partial trace. These end the request but are **returned**, never thrown.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminalFailure {
    /// Even the compressed, essential-only selection cannot fit the budget.
    BudgetInfeasible {
        required_tokens: usize,
        budget_tokens: usize,
    },
    /// No static template matched and synthesis was unavailable.
    TemplateNotFound { intent: String },
    /// Internal invariant violated (unexpected/fatal class).
    AssemblyFailure { reason: String },
}

impl std::fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetInfeasible {
                required_tokens,
                budget_tokens,
            } => write!(
                f,
                "budget infeasible: essential sections need {} tokens, budget is {}",
                required_tokens, budget_tokens
            ),
            Self::TemplateNotFound { intent } => {
                write!(f, "no template available for intent '{}'", intent)
            }
            Self::AssemblyFailure { reason } => write!(f, "assembly failure: {}", reason),
        }
    }
}
