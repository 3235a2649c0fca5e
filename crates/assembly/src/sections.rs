//! Candidate section generation.
//!
//! Turns a `ContextualSchema` into the flat list of `ContextSection`
//! candidates the optimizer selects from. Generation is deterministic:
//! identical schema and profile always produce identical candidates in
//! identical order.

use promptforge_core::profile::BusinessContextProfile;
use promptforge_core::schema::{ContextualSchema, Governance, RelationshipKind};
use promptforge_core::section::{CompressedVariant, ContextSection, SectionKind};
use promptforge_core::token::{estimate_section_tokens, estimate_tokens};

/// Description prefix kept in a compressed table summary.
const COMPRESSED_DESCRIPTION_CHARS: usize = 60;
/// Columns kept in a compressed column group.
const COMPRESSED_COLUMN_COUNT: usize = 4;

/// Generate candidate sections from the retrieved schema.
///
/// Order: per table (summary, then columns) in rank order, then
/// relationships, rules, glossary. The optimizer preserves this order in
/// its output, so the final prompt reads best-table-first.
pub fn build_sections(
    profile: &BusinessContextProfile,
    schema: &ContextualSchema,
) -> Vec<ContextSection> {
    let mut sections = Vec::new();

    for (rank, table) in schema.tables.iter().enumerate() {
        sections.push(table_summary(rank, table));
        let columns = schema.columns_for(&table.id);
        if !columns.is_empty() {
            sections.push(column_group(rank, table, columns));
        }
    }

    if !schema.relationships.is_empty() {
        sections.push(relationship_section(schema));
    }

    for rule in &schema.rules {
        sections.push(rule_section(rule));
    }

    if !schema.glossary.is_empty() {
        sections.push(glossary_section(schema));
    }

    tracing::debug!(
        candidates = sections.len(),
        question = %profile.question,
        "candidate sections generated"
    );
    sections
}

// Costs include the per-section separator overhead added at render time.
fn with_cost(mut section: ContextSection) -> ContextSection {
    section.token_cost = estimate_section_tokens(&section);
    if let Some(c) = &mut section.compressed {
        c.token_cost = estimate_tokens(&c.text) + 2;
    }
    section
}

fn table_summary(
    rank: usize,
    table: &promptforge_core::schema::TableCandidate,
) -> ContextSection {
    let text = format!("Table `{}`: {}", table.name, table.description);
    let short_desc: String = table
        .description
        .chars()
        .take(COMPRESSED_DESCRIPTION_CHARS)
        .collect();
    let compressed = CompressedVariant {
        text: format!("Table `{}`: {}", table.name, short_desc.trim_end()),
        token_cost: 0,
    };
    with_cost(ContextSection {
        id: format!("table:{}", table.id),
        kind: SectionKind::TableSummary,
        source_table: Some(table.id.clone()),
        text,
        relevance: table.score,
        importance: importance_by_rank(1.0, rank),
        token_cost: 0,
        // The top-ranked table anchors the prompt; the optimizer must not
        // drop it.
        essential: rank == 0,
        compressed: Some(compressed),
    })
}

fn column_group(
    rank: usize,
    table: &promptforge_core::schema::TableCandidate,
    columns: &[promptforge_core::schema::ColumnInfo],
) -> ContextSection {
    let mut lines = vec![format!("Columns of `{}`:", table.name)];
    for col in columns {
        let description = match col.governance {
            Governance::Masked => "[masked]",
            _ => col.description.as_str(),
        };
        lines.push(format!("  - {} ({}): {}", col.name, col.data_type, description));
    }
    let text = lines.join("\n");

    let mut short_lines = vec![format!("Columns of `{}`:", table.name)];
    for col in columns.iter().take(COMPRESSED_COLUMN_COUNT) {
        short_lines.push(format!("  - {} ({})", col.name, col.data_type));
    }
    let compressed = CompressedVariant {
        text: short_lines.join("\n"),
        token_cost: 0,
    };

    let relevance = if columns.is_empty() {
        0.0
    } else {
        columns.iter().map(|c| c.score).sum::<f32>() / columns.len() as f32
    };

    with_cost(ContextSection {
        id: format!("columns:{}", table.id),
        kind: SectionKind::ColumnGroup,
        source_table: Some(table.id.clone()),
        text,
        relevance: relevance.clamp(0.0, 1.0),
        importance: importance_by_rank(0.8, rank),
        token_cost: 0,
        essential: false,
        compressed: Some(compressed),
    })
}

fn relationship_section(schema: &ContextualSchema) -> ContextSection {
    let name_of = |id: &str| {
        schema
            .tables
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut lines = vec!["Join paths:".to_string()];
    for r in &schema.relationships {
        let kind = match r.kind {
            RelationshipKind::ForeignKey => "foreign key",
            RelationshipKind::Inferred => "inferred",
        };
        lines.push(format!(
            "  - {}.{} -> {}.{} ({})",
            name_of(&r.from_table),
            r.from_column,
            name_of(&r.to_table),
            r.to_column,
            kind
        ));
    }
    with_cost(ContextSection {
        id: "relationships".into(),
        kind: SectionKind::Relationship,
        source_table: None,
        text: lines.join("\n"),
        relevance: 0.7,
        importance: 0.9,
        token_cost: 0,
        essential: false,
        compressed: None,
    })
}

fn rule_section(rule: &promptforge_core::schema::BusinessRule) -> ContextSection {
    with_cost(ContextSection {
        id: format!("rule:{}", rule.id),
        kind: SectionKind::Rule,
        source_table: rule.table_ids.first().cloned(),
        text: format!("Rule: {}", rule.description),
        relevance: 0.8,
        importance: 0.9,
        token_cost: 0,
        essential: rule.mandatory,
        compressed: None,
    })
}

fn glossary_section(schema: &ContextualSchema) -> ContextSection {
    let mut lines = vec!["Business terms:".to_string()];
    for term in &schema.glossary {
        lines.push(format!("  - {}: {}", term.term, term.definition));
    }
    let relevance = schema.glossary.iter().map(|t| t.score).sum::<f32>()
        / schema.glossary.len() as f32;
    with_cost(ContextSection {
        id: "glossary".into(),
        kind: SectionKind::Glossary,
        source_table: None,
        text: lines.join("\n"),
        relevance: relevance.clamp(0.0, 1.0),
        importance: 0.6,
        token_cost: 0,
        essential: false,
        compressed: None,
    })
}

/// Importance decays with table rank and floors at half the base.
fn importance_by_rank(base: f32, rank: usize) -> f32 {
    (base - 0.1 * rank as f32).max(base / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_core::profile::{DomainMatch, Intent};
    use promptforge_core::schema::{
        BusinessRule, ColumnInfo, RetrievalOutcome, TableCandidate, TableRelationship,
    };
    use std::collections::BTreeMap;

    fn profile() -> BusinessContextProfile {
        BusinessContextProfile {
            question: "total deposits".into(),
            user_id: None,
            intent: Intent::unknown(),
            domain: DomainMatch::uncategorized(),
            entities: vec![],
            terms: vec![],
            time_range: None,
            confidence: 0.5,
            degraded: false,
        }
    }

    fn schema() -> ContextualSchema {
        let table = TableCandidate {
            id: "tbl_transactions".into(),
            name: "transactions".into(),
            description: "All monetary transactions including deposits and withdrawals"
                .into(),
            domain_tags: vec!["banking".into()],
            score: 0.9,
            score_breakdown: BTreeMap::new(),
        };
        let mut columns = BTreeMap::new();
        columns.insert(
            "tbl_transactions".to_string(),
            vec![
                ColumnInfo {
                    name: "amount".into(),
                    data_type: "decimal".into(),
                    description: "Transaction amount".into(),
                    governance: Governance::Open,
                    score: 0.8,
                },
                ColumnInfo {
                    name: "email".into(),
                    data_type: "text".into(),
                    description: "Customer email".into(),
                    governance: Governance::Masked,
                    score: 0.2,
                },
            ],
        );
        ContextualSchema {
            tables: vec![table],
            columns,
            glossary: vec![],
            rules: vec![BusinessRule {
                id: "r1".into(),
                description: "Only completed transactions".into(),
                table_ids: vec!["tbl_transactions".into()],
                mandatory: true,
            }],
            relationships: vec![TableRelationship {
                from_table: "tbl_transactions".into(),
                from_column: "player_id".into(),
                to_table: "tbl_players".into(),
                to_column: "id".into(),
                kind: RelationshipKind::ForeignKey,
            }],
            relevance: 0.9,
            outcome: RetrievalOutcome::Complete,
        }
    }

    #[test]
    fn generates_expected_candidate_kinds() {
        let sections = build_sections(&profile(), &schema());
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::TableSummary,
                SectionKind::ColumnGroup,
                SectionKind::Relationship,
                SectionKind::Rule,
            ]
        );
    }

    #[test]
    fn top_table_summary_is_essential() {
        let sections = build_sections(&profile(), &schema());
        assert!(sections[0].essential);
        assert_eq!(sections[0].source_table.as_deref(), Some("tbl_transactions"));
    }

    #[test]
    fn mandatory_rule_is_essential() {
        let sections = build_sections(&profile(), &schema());
        let rule = sections.iter().find(|s| s.kind == SectionKind::Rule).unwrap();
        assert!(rule.essential);
        assert!(rule.text.contains("Only completed"));
    }

    #[test]
    fn masked_columns_are_redacted() {
        let sections = build_sections(&profile(), &schema());
        let cols = sections
            .iter()
            .find(|s| s.kind == SectionKind::ColumnGroup)
            .unwrap();
        assert!(cols.text.contains("[masked]"));
        assert!(!cols.text.contains("Customer email"));
    }

    #[test]
    fn token_costs_are_estimated() {
        let sections = build_sections(&profile(), &schema());
        for s in &sections {
            assert!(s.token_cost > 0, "section {} has no cost", s.id);
            if let Some(c) = &s.compressed {
                assert!(c.token_cost > 0);
                assert!(c.token_cost <= s.token_cost);
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = build_sections(&profile(), &schema());
        let b = build_sections(&profile(), &schema());
        let texts_a: Vec<&str> = a.iter().map(|s| s.text.as_str()).collect();
        let texts_b: Vec<&str> = b.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);
    }

    #[test]
    fn relationship_section_names_tables() {
        let sections = build_sections(&profile(), &schema());
        let rel = sections
            .iter()
            .find(|s| s.kind == SectionKind::Relationship)
            .unwrap();
        assert!(rel.text.contains("transactions.player_id"));
        assert!(rel.text.contains("foreign key"));
    }
}
