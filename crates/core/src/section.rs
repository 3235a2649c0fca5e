//! Context sections — the atomic units of prompt material.
//!
//! Candidate sections are generated from a `ContextualSchema`; only the
//! subset chosen by the Assembly Engine's optimizer reaches the final
//! prompt. No bypass path exists: the assembler only renders sections the
//! optimizer explicitly selected.

use serde::{Deserialize, Serialize};

/// What kind of prompt material a section carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    TableSummary,
    ColumnGroup,
    Rule,
    Example,
    Glossary,
    Relationship,
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TableSummary => write!(f, "table_summary"),
            Self::ColumnGroup => write!(f, "column_group"),
            Self::Rule => write!(f, "rule"),
            Self::Example => write!(f, "example"),
            Self::Glossary => write!(f, "glossary"),
            Self::Relationship => write!(f, "relationship"),
        }
    }
}

/// A shortened rendering of a section, tried before dropping it entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedVariant {
    pub text: String,
    pub token_cost: usize,
}

/// An atomic unit of prompt material with its selection metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// Stable id for trace bookkeeping (e.g. "table:tbl_transactions").
    pub id: String,
    pub kind: SectionKind,
    /// The table this section was sourced from, for domain-exclusion audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    /// Rendered prompt text, uncompressed.
    pub text: String,
    /// Relevance to the profile, in [0, 1].
    pub relevance: f32,
    /// Structural importance, in [0, 1].
    pub importance: f32,
    /// Estimated token cost of `text`.
    pub token_cost: usize,
    /// Essential sections are guaranteed inclusion by the optimizer's
    /// post-pass even when they lose the knapsack.
    #[serde(default)]
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed: Option<CompressedVariant>,
}

impl ContextSection {
    /// Efficiency score used by the budget optimizer:
    /// `relevance · importance / token_cost`.
    ///
    /// A zero-cost section is treated as costing one token so the score
    /// stays finite.
    pub fn efficiency(&self) -> f32 {
        (self.relevance * self.importance) / self.token_cost.max(1) as f32
    }

    /// Token cost of the cheapest available rendering.
    pub fn min_token_cost(&self) -> usize {
        match &self.compressed {
            Some(c) => c.token_cost.min(self.token_cost),
            None => self.token_cost,
        }
    }
}
