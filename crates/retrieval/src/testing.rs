//! Fixture collaborators for tests.
//!
//! A small banking + gaming catalog with deterministic scoring, used by
//! this crate's unit tests and by downstream integration tests.

use async_trait::async_trait;

use promptforge_core::deadline::Deadline;
use promptforge_core::error::RetrievalError;
use promptforge_core::metadata::{MetadataStore, RelationshipSource};
use promptforge_core::schema::{
    BusinessRule, ColumnInfo, GlossaryTerm, Governance, RelationshipKind, TableCandidate,
    TableRelationship,
};
use promptforge_core::scoring::{LexicalScorer, ScoringStrategy};

fn table(id: &str, name: &str, description: &str, tags: &[&str]) -> TableCandidate {
    TableCandidate {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        domain_tags: tags.iter().map(|t| t.to_string()).collect(),
        score: 0.0,
        score_breakdown: Default::default(),
    }
}

/// Crude singular stem: "depositors" and "deposits" both reach "deposit".
fn stem(word: &str) -> &str {
    let w = word.trim_end_matches('s');
    w.strip_suffix("or").unwrap_or(w)
}

fn column(name: &str, data_type: &str, description: &str, governance: Governance) -> ColumnInfo {
    ColumnInfo {
        name: name.into(),
        data_type: data_type.into(),
        description: description.into(),
        governance,
        score: 0.0,
    }
}

/// An in-memory metadata catalog.
pub struct FixtureStore {
    tables: Vec<TableCandidate>,
}

impl FixtureStore {
    /// A catalog holding three banking-side tables and two gaming-only
    /// tables.
    pub fn banking_and_gaming() -> Self {
        Self {
            tables: vec![
                table(
                    "tbl_transactions",
                    "transactions",
                    "All monetary transactions including deposits and withdrawals",
                    &["banking"],
                ),
                table(
                    "tbl_players",
                    "players",
                    "Player accounts with registration country and status",
                    &["banking", "gaming"],
                ),
                table(
                    "tbl_countries",
                    "countries",
                    "Country reference data with ISO codes",
                    &[],
                ),
                table(
                    "tbl_game_sessions",
                    "game_sessions",
                    "Gameplay sessions and rounds played",
                    &["gaming"],
                ),
                table("tbl_games", "games", "Game catalog and providers", &["gaming"]),
            ],
        }
    }

    /// A catalog with no tables at all.
    pub fn empty() -> Self {
        Self { tables: Vec::new() }
    }
}

#[async_trait]
impl MetadataStore for FixtureStore {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn tables_by_semantic(
        &self,
        query: &str,
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        // Stand-in for an embedding store: lexical overlap, widened with
        // the geo aliases an embedding model would resolve on its own.
        let mut expanded = query.to_lowercase();
        for alias in ["uk", "germany", "france", "spain"] {
            if expanded.split_whitespace().any(|w| w == alias) {
                expanded.push_str(" country");
                break;
            }
        }
        Ok(self
            .tables
            .iter()
            .filter_map(|t| {
                let score = LexicalScorer.similarity(&expanded, &t.description);
                (score > 0.0).then(|| TableCandidate { score, ..t.clone() })
            })
            .collect())
    }

    async fn tables_by_domain(
        &self,
        domain: &str,
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Ok(self
            .tables
            .iter()
            .filter(|t| t.domain_tags.iter().any(|tag| tag == domain))
            .map(|t| TableCandidate {
                score: 0.8,
                ..t.clone()
            })
            .collect())
    }

    async fn tables_by_entities(
        &self,
        entities: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Ok(self
            .tables
            .iter()
            .filter(|t| {
                entities.iter().any(|e| {
                    let stem = stem(e);
                    t.name.contains(stem) || t.description.to_lowercase().contains(stem)
                })
            })
            .map(|t| TableCandidate {
                score: 0.7,
                ..t.clone()
            })
            .collect())
    }

    async fn tables_by_terms(
        &self,
        terms: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Ok(self
            .tables
            .iter()
            .filter(|t| {
                terms
                    .iter()
                    .any(|term| t.description.to_lowercase().contains(&term.to_lowercase()))
            })
            .map(|t| TableCandidate {
                score: 0.6,
                ..t.clone()
            })
            .collect())
    }

    async fn columns_of(
        &self,
        table_id: &str,
        _deadline: Deadline,
    ) -> Result<Vec<ColumnInfo>, RetrievalError> {
        Ok(match table_id {
            "tbl_transactions" => vec![
                column("amount", "decimal", "Transaction amount in account currency", Governance::Open),
                column("transaction_type", "text", "deposit, withdrawal or transfer", Governance::Open),
                column("status", "text", "pending, completed or failed", Governance::Open),
                column("player_id", "bigint", "Owning player account", Governance::Open),
                column("created_at", "timestamp", "When the transaction happened", Governance::Open),
                column("currency", "text", "ISO currency code", Governance::Open),
                column("country_code", "text", "Country the transaction originated from", Governance::Open),
                column("fee", "decimal", "Processing fee", Governance::Open),
                column("note", "text", "Free-form operator note", Governance::Open),
                column("email", "text", "Customer email", Governance::Masked),
                column("card_number", "text", "Payment card PAN", Governance::Restricted),
            ],
            "tbl_players" => vec![
                column("id", "bigint", "Player id", Governance::Open),
                column("country_code", "text", "ISO country of residence", Governance::Open),
                column("registered_at", "timestamp", "Registration time", Governance::Open),
                column("vip_level", "int", "Loyalty tier", Governance::Open),
                column("email", "text", "Player email", Governance::Masked),
            ],
            "tbl_countries" => vec![
                column("code", "text", "ISO country code", Governance::Open),
                column("name", "text", "Country name", Governance::Open),
            ],
            "tbl_game_sessions" => vec![
                column("session_id", "bigint", "Session id", Governance::Open),
                column("game_id", "bigint", "Game played", Governance::Open),
                column("duration_secs", "int", "Session length", Governance::Open),
            ],
            _ => Vec::new(),
        })
    }

    async fn glossary_for(
        &self,
        query: &str,
        _deadline: Deadline,
    ) -> Result<Vec<GlossaryTerm>, RetrievalError> {
        let mut terms = Vec::new();
        if query.to_lowercase().contains("deposit") {
            terms.push(GlossaryTerm {
                term: "deposit".into(),
                definition: "Incoming customer funds credited to an account".into(),
                score: 0.9,
            });
        }
        Ok(terms)
    }

    async fn rules_for(
        &self,
        table_ids: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<BusinessRule>, RetrievalError> {
        let mut rules = Vec::new();
        if table_ids.iter().any(|id| id == "tbl_transactions") {
            rules.push(BusinessRule {
                id: "rule_completed_only".into(),
                description: "Only count transactions with status = 'completed'".into(),
                table_ids: vec!["tbl_transactions".into()],
                mandatory: true,
            });
        }
        Ok(rules)
    }
}

/// A store whose every call fails — exercises the partial-data path.
pub struct UnavailableStore;

#[async_trait]
impl MetadataStore for UnavailableStore {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn tables_by_semantic(
        &self,
        _query: &str,
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn tables_by_domain(
        &self,
        _domain: &str,
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn tables_by_entities(
        &self,
        _entities: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn tables_by_terms(
        &self,
        _terms: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableCandidate>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn columns_of(
        &self,
        _table_id: &str,
        _deadline: Deadline,
    ) -> Result<Vec<ColumnInfo>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn glossary_for(
        &self,
        _query: &str,
        _deadline: Deadline,
    ) -> Result<Vec<GlossaryTerm>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }

    async fn rules_for(
        &self,
        _table_ids: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<BusinessRule>, RetrievalError> {
        Err(RetrievalError::StoreUnavailable("scripted outage".into()))
    }
}

/// Relationship fixtures for the banking catalog.
pub struct StaticRelationships {
    relationships: Vec<TableRelationship>,
}

impl StaticRelationships {
    pub fn transactions_to_players() -> Self {
        Self {
            relationships: vec![
                TableRelationship {
                    from_table: "tbl_transactions".into(),
                    from_column: "player_id".into(),
                    to_table: "tbl_players".into(),
                    to_column: "id".into(),
                    kind: RelationshipKind::ForeignKey,
                },
                TableRelationship {
                    from_table: "tbl_players".into(),
                    from_column: "country_code".into(),
                    to_table: "tbl_countries".into(),
                    to_column: "code".into(),
                    kind: RelationshipKind::Inferred,
                },
            ],
        }
    }
}

#[async_trait]
impl RelationshipSource for StaticRelationships {
    async fn relationships_among(
        &self,
        table_ids: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableRelationship>, RetrievalError> {
        Ok(self
            .relationships
            .iter()
            .filter(|r| table_ids.contains(&r.from_table) && table_ids.contains(&r.to_table))
            .cloned()
            .collect())
    }
}

/// A relationship source that knows nothing.
pub struct NoRelationships;

#[async_trait]
impl RelationshipSource for NoRelationships {
    async fn relationships_among(
        &self,
        _table_ids: &[String],
        _deadline: Deadline,
    ) -> Result<Vec<TableRelationship>, RetrievalError> {
        Ok(Vec::new())
    }
}
