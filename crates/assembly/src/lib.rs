//! Context assembly for PromptForge.
//!
//! Generates candidate sections from a retrieved schema and solves the
//! token-budget selection problem: a 0/1 knapsack with an exact DP path
//! for bounded budgets, greedy above, plus compression and essential
//! guarantees. The final prompt contains exactly the sections selected
//! here — there is no bypass path.

pub mod optimizer;
pub mod sections;

pub use optimizer::{
    AssemblyResult, ContextAssemblyEngine, SelectedSection, TokenBudget,
};
pub use sections::build_sections;
