//! Schema metadata types — tables, columns, glossary, rules, relationships.
//!
//! `ContextualSchema` is the Retrieval Engine's output: a ranked,
//! domain-filtered view of the warehouse schema relevant to one profile.
//! Downstream stages consume it read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profile::IntentKind;

/// A domain descriptor from the registry the analyzer and retrieval engine
/// match against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDescriptor {
    pub name: String,
    pub description: String,
    pub key_concepts: Vec<String>,
    /// When true, tables tagged with this domain and no other are removed
    /// outright for profiles matched to a different domain.
    #[serde(default)]
    pub exclusive: bool,
    /// Intents this domain is never relevant to (e.g. a gameplay domain for
    /// financial aggregation queries).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_intents: Vec<IntentKind>,
}

/// Governance classification of a column, as reported by the metadata store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Governance {
    /// Freely usable in prompts.
    #[default]
    Open,
    /// Included, but its description is redacted in prompt material.
    Masked,
    /// Never included in prompt material.
    Restricted,
}

/// A column of a candidate table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub governance: Governance,
    /// Relevance to the current profile, set during column selection.
    #[serde(default)]
    pub score: f32,
}

/// A ranked candidate table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Stable identifier in the metadata store.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Domains this table belongs to (e.g. ["banking"], ["gaming"]).
    #[serde(default)]
    pub domain_tags: Vec<String>,
    /// Merged relevance score in [0, 1].
    pub score: f32,
    /// Per-strategy contributions, keyed by strategy name. Kept for the
    /// construction trace and `ExplainConstruction`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub score_breakdown: BTreeMap<String, f32>,
}

/// A business glossary term relevant to the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub score: f32,
}

/// A business rule attached to one or more tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: String,
    pub description: String,
    /// Tables this rule applies to (by table id).
    #[serde(default)]
    pub table_ids: Vec<String>,
    /// Mandatory rules become essential prompt sections.
    #[serde(default)]
    pub mandatory: bool,
}

/// How two tables are related.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Declared foreign key.
    ForeignKey,
    /// Inferred from column naming / profiling.
    Inferred,
}

/// A join path between two selected tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRelationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub kind: RelationshipKind,
}

/// Whether retrieval completed, returned partial data, or found nothing.
///
/// `Empty` (zero candidates after filtering) is a distinct outcome from
/// `Partial` (the store timed out mid-discovery).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Complete,
    Partial,
    Empty,
}

/// The ranked, domain-filtered schema context for one request.
///
/// Produced by the Retrieval Engine; consumed, never mutated, downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualSchema {
    /// Candidate tables, best first, truncated to the configured top-K.
    pub tables: Vec<TableCandidate>,
    /// Selected columns per table id.
    pub columns: BTreeMap<String, Vec<ColumnInfo>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glossary: Vec<GlossaryTerm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<BusinessRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<TableRelationship>,
    /// Weighted average of component scores, in [0, 1].
    pub relevance: f32,
    pub outcome: RetrievalOutcome,
}

impl ContextualSchema {
    /// An empty result — the explicit zero-candidate outcome.
    pub fn empty() -> Self {
        Self {
            tables: Vec::new(),
            columns: BTreeMap::new(),
            glossary: Vec::new(),
            rules: Vec::new(),
            relationships: Vec::new(),
            relevance: 0.0,
            outcome: RetrievalOutcome::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Columns selected for a table, or an empty slice.
    pub fn columns_for(&self, table_id: &str) -> &[ColumnInfo] {
        self.columns.get(table_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_schema_is_empty_outcome() {
        let schema = ContextualSchema::empty();
        assert!(schema.is_empty());
        assert_eq!(schema.outcome, RetrievalOutcome::Empty);
        assert_eq!(schema.relevance, 0.0);
    }

    #[test]
    fn columns_for_missing_table_is_empty() {
        let schema = ContextualSchema::empty();
        assert!(schema.columns_for("tbl_transactions").is_empty());
    }

    #[test]
    fn governance_default_is_open() {
        let col: ColumnInfo = serde_json::from_str(
            r#"{"name": "amount", "data_type": "decimal"}"#,
        )
        .unwrap();
        assert_eq!(col.governance, Governance::Open);
        assert_eq!(col.score, 0.0);
    }

    #[test]
    fn table_candidate_serialization_keeps_breakdown() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("semantic".to_string(), 0.7_f32);
        breakdown.insert("entity".to_string(), 0.4_f32);
        let table = TableCandidate {
            id: "tbl_transactions".into(),
            name: "transactions".into(),
            description: "All monetary transactions".into(),
            domain_tags: vec!["banking".into()],
            score: 0.64,
            score_breakdown: breakdown,
        };
        let json = serde_json::to_string(&table).unwrap();
        let back: TableCandidate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score_breakdown.len(), 2);
        assert_eq!(back.domain_tags, vec!["banking".to_string()]);
    }
}
