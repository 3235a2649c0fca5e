//! # PromptForge Pipeline
//!
//! The request-scoped construction pipeline: a natural-language business
//! question goes in, a schema-grounded, token-budget-constrained prompt
//! comes out, together with a complete, replayable construction trace.
//!
//! ## Stages
//!
//! 1. **Analyze** — intent, domain, entities, time range (fan-out + join)
//! 2. **Retrieve** — ranked, domain-filtered schema candidates
//! 3. **Select template** — static corpus or dynamic synthesis
//! 4. **Assemble** — knapsack selection under the token budget
//! 5. **Render** — deterministic slot fill with exact token recount
//!
//! Degradations (fallback classification, partial retrieval) lower
//! confidence and continue; only `BudgetInfeasible` and `TemplateNotFound`
//! end a request, and even then the caller gets the finalized trace.

pub mod constructor;
pub mod explain;
pub mod options;

pub use constructor::{
    ConstructedPrompt, Construction, ConstructionOutcome, PromptConstructor,
};
pub use explain::{ConstructionExplainer, Explanation, StepRationale};
pub use options::ConstructOptions;
