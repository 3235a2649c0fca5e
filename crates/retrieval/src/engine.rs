//! The Metadata Retrieval Engine.
//!
//! Four discovery strategies run concurrently against the external
//! metadata store — semantic similarity, domain tags, entity names,
//! glossary terms — and their result lists are merged by a pure weighted
//! function: no locking, no shared state. A hard domain-exclusion filter
//! runs *before* ranking, so a gameplay-only table never competes for a
//! slot in a banking query at all.
//!
//! Failure semantics: a store timeout never fails the request. The engine
//! returns whatever partial candidate set it has, flagged `Partial`. Zero
//! candidates with a healthy store is the distinct `Empty` outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use promptforge_config::RetrievalConfig;
use promptforge_core::cache::Cache;
use promptforge_core::deadline::Deadline;
use promptforge_core::error::RetrievalError;
use promptforge_core::metadata::{MetadataStore, RelationshipSource};
use promptforge_core::profile::{BusinessContextProfile, EntityKind};
use promptforge_core::schema::{
    ColumnInfo, ContextualSchema, DomainDescriptor, Governance, RetrievalOutcome, TableCandidate,
};
use promptforge_core::scoring::ScoringStrategy;

use crate::cache_key::retrieval_cache_key;

/// Result of one retrieval, with bookkeeping for the trace and metrics.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub schema: ContextualSchema,
    pub cache_hit: bool,
    /// Store calls that hit the deadline.
    pub timeouts: u32,
}

/// The retrieval engine. Stateless across requests — create one and share.
pub struct MetadataRetrievalEngine {
    store: Arc<dyn MetadataStore>,
    relationships: Arc<dyn RelationshipSource>,
    scorer: Arc<dyn ScoringStrategy>,
    cache: Arc<dyn Cache<ContextualSchema>>,
    domains: Vec<DomainDescriptor>,
    config: RetrievalConfig,
}

impl MetadataRetrievalEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        relationships: Arc<dyn RelationshipSource>,
        scorer: Arc<dyn ScoringStrategy>,
        cache: Arc<dyn Cache<ContextualSchema>>,
        domains: Vec<DomainDescriptor>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            relationships,
            scorer,
            cache,
            domains,
            config,
        }
    }

    /// Retrieve the contextual schema for a profile.
    ///
    /// `max_tables` overrides the configured top-K when given.
    pub async fn retrieve(
        &self,
        profile: &BusinessContextProfile,
        max_tables: Option<usize>,
        deadline: Deadline,
    ) -> Retrieval {
        let k = max_tables.unwrap_or(self.config.max_tables).max(1);
        let key = retrieval_cache_key(&profile.question, profile.user_id.as_deref());

        if let Some(schema) = self.cache.get(&key).await {
            debug!(key = %key, "retrieval cache hit");
            return Retrieval {
                schema,
                cache_hit: true,
                timeouts: 0,
            };
        }

        // ── Fan out the four discovery strategies ──
        let entity_names: Vec<String> = profile
            .entities
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    EntityKind::Table | EntityKind::Column | EntityKind::Metric | EntityKind::Dimension
                )
            })
            .map(|e| e.name.clone())
            .collect();
        let term_names: Vec<String> = profile.terms.iter().map(|t| t.term.clone()).collect();

        let (semantic, by_domain, by_entity, by_terms) = tokio::join!(
            self.run_strategy("semantic", deadline, async {
                self.store.tables_by_semantic(&profile.question, deadline).await
            }),
            self.run_strategy("domain", deadline, async {
                if profile.domain.is_uncategorized() {
                    Ok(Vec::new())
                } else {
                    self.store.tables_by_domain(&profile.domain.name, deadline).await
                }
            }),
            self.run_strategy("entity", deadline, async {
                if entity_names.is_empty() {
                    Ok(Vec::new())
                } else {
                    self.store.tables_by_entities(&entity_names, deadline).await
                }
            }),
            self.run_strategy("glossary", deadline, async {
                if term_names.is_empty() {
                    Ok(Vec::new())
                } else {
                    self.store.tables_by_terms(&term_names, deadline).await
                }
            }),
        );

        let mut timeouts = semantic.1 + by_domain.1 + by_entity.1 + by_terms.1;

        // Hard exclusion before ranking, per strategy list.
        let weighted = [
            ("semantic", self.config.semantic_weight, semantic.0),
            ("domain", self.config.domain_weight, by_domain.0),
            ("entity", self.config.entity_weight, by_entity.0),
            ("glossary", self.config.glossary_weight, by_terms.0),
        ]
        .map(|(name, weight, list)| {
            let kept: Vec<TableCandidate> = list
                .into_iter()
                .filter(|t| {
                    let excluded = is_domain_excluded(t, profile, &self.domains);
                    if excluded {
                        debug!(table = %t.id, domain = %profile.domain.name, "hard-excluded table");
                    }
                    !excluded
                })
                .collect();
            (name, weight, kept)
        });

        let tables = merge_candidates(weighted, k);

        if tables.is_empty() {
            let outcome = if timeouts > 0 {
                RetrievalOutcome::Partial
            } else {
                RetrievalOutcome::Empty
            };
            info!(?outcome, "retrieval produced no candidates");
            return Retrieval {
                schema: ContextualSchema {
                    outcome,
                    ..ContextualSchema::empty()
                },
                cache_hit: false,
                timeouts,
            };
        }

        // ── Enrich the selected tables concurrently ──
        let table_ids: Vec<String> = tables.iter().map(|t| t.id.clone()).collect();
        let (column_results, glossary, rules, relationships) = tokio::join!(
            join_all(
                tables
                    .iter()
                    .map(|t| async { (t.id.clone(), self.select_columns(profile, &t.id, deadline).await) })
            ),
            bounded(
                self.store.glossary_for(&profile.question, deadline),
                deadline,
                self.config.store_timeout_ms,
            ),
            bounded(
                self.store.rules_for(&table_ids, deadline),
                deadline,
                self.config.store_timeout_ms,
            ),
            bounded(
                self.relationships.relationships_among(&table_ids, deadline),
                deadline,
                self.config.store_timeout_ms,
            ),
        );

        let mut columns = BTreeMap::new();
        for (table_id, (cols, timed_out)) in column_results {
            timeouts += u32::from(timed_out);
            columns.insert(table_id, cols);
        }

        let (glossary, g_timeout) = unwrap_or_empty("glossary_for", glossary);
        let (rules, r_timeout) = unwrap_or_empty("rules_for", rules);
        let (mut relationships, rel_timeout) = unwrap_or_empty("relationships_among", relationships);
        timeouts += u32::from(g_timeout) + u32::from(r_timeout) + u32::from(rel_timeout);

        // Only joins between selected tables are usable downstream.
        relationships.retain(|r| {
            table_ids.contains(&r.from_table) && table_ids.contains(&r.to_table)
        });

        let relevance = (tables.iter().map(|t| t.score).sum::<f32>() / tables.len() as f32)
            .clamp(0.0, 1.0);
        let outcome = if timeouts > 0 {
            RetrievalOutcome::Partial
        } else {
            RetrievalOutcome::Complete
        };

        let schema = ContextualSchema {
            tables,
            columns,
            glossary,
            rules,
            relationships,
            relevance,
            outcome,
        };

        info!(
            tables = schema.tables.len(),
            relationships = schema.relationships.len(),
            ?outcome,
            "metadata retrieved"
        );

        // Partial results are never cached; the next request retries fresh.
        if outcome == RetrievalOutcome::Complete {
            self.cache
                .put(&key, schema.clone(), Duration::from_secs(self.config.cache_ttl_secs))
                .await;
        }

        Retrieval {
            schema,
            cache_hit: false,
            timeouts,
        }
    }

    async fn run_strategy<F>(
        &self,
        name: &'static str,
        deadline: Deadline,
        call: F,
    ) -> (Vec<TableCandidate>, u32)
    where
        F: std::future::Future<Output = std::result::Result<Vec<TableCandidate>, RetrievalError>>,
    {
        match bounded(call, deadline, self.config.store_timeout_ms).await {
            Some(Ok(list)) => (list, 0),
            Some(Err(e)) => {
                warn!(strategy = name, error = %e, "discovery strategy failed");
                (Vec::new(), 1)
            }
            None => {
                warn!(strategy = name, "discovery strategy timed out");
                (Vec::new(), 1)
            }
        }
    }

    /// Score, filter, and truncate a table's columns.
    ///
    /// Restricted columns never pass; masked ones flow through and are
    /// redacted at section rendering.
    async fn select_columns(
        &self,
        profile: &BusinessContextProfile,
        table_id: &str,
        deadline: Deadline,
    ) -> (Vec<ColumnInfo>, bool) {
        let result = bounded(
            self.store.columns_of(table_id, deadline),
            deadline,
            self.config.store_timeout_ms,
        )
        .await;

        let (all, timed_out) = unwrap_or_empty("columns_of", result);
        let mut scored: Vec<ColumnInfo> = all
            .into_iter()
            .filter(|c| c.governance != Governance::Restricted)
            .map(|mut c| {
                c.score = self.score_column(profile, &c);
                c
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.max_columns_per_table);
        (scored, timed_out)
    }

    fn score_column(&self, profile: &BusinessContextProfile, col: &ColumnInfo) -> f32 {
        let targets: Vec<&str> = profile
            .entities
            .iter()
            .filter(|e| {
                matches!(e.kind, EntityKind::Column | EntityKind::Metric | EntityKind::Dimension)
            })
            .map(|e| e.name.as_str())
            .collect();
        if targets.is_empty() {
            return 0.3;
        }
        let best = targets
            .iter()
            .map(|t| {
                0.6 * self.scorer.similarity(t, &col.name)
                    + 0.4 * self.scorer.similarity(t, &col.description)
            })
            .fold(0.0_f32, f32::max);
        (0.1 + 0.9 * best).clamp(0.0, 1.0)
    }
}

/// Run a store call under both the request deadline and the per-call
/// timeout. `None` means the call was cut off.
async fn bounded<F, T>(call: F, deadline: Deadline, store_timeout_ms: u64) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    let limit = deadline
        .remaining()
        .min(Duration::from_millis(store_timeout_ms));
    tokio::time::timeout(limit, call).await.ok()
}

fn unwrap_or_empty<T>(
    call: &'static str,
    result: Option<std::result::Result<Vec<T>, RetrievalError>>,
) -> (Vec<T>, bool) {
    match result {
        Some(Ok(list)) => (list, false),
        Some(Err(e)) => {
            warn!(call, error = %e, "store call failed, continuing with partial data");
            (Vec::new(), true)
        }
        None => {
            warn!(call, "store call timed out, continuing with partial data");
            (Vec::new(), true)
        }
    }
}

/// True when the table is tagged exclusively for a domain that is either
/// exclusive-and-foreign to the profile's domain, or excluded for the
/// profile's intent. Removal happens before ranking — these tables are
/// never merely down-ranked.
fn is_domain_excluded(
    table: &TableCandidate,
    profile: &BusinessContextProfile,
    registry: &[DomainDescriptor],
) -> bool {
    let mut tags = table.domain_tags.iter();
    let Some(first) = tags.next() else {
        return false; // untagged tables are never excluded
    };
    if !tags.all(|t| t == first) {
        return false; // multi-domain tables stay in
    }
    let Some(descriptor) = registry.iter().find(|d| &d.name == first) else {
        return false;
    };
    if descriptor.exclusive && profile.domain.name != descriptor.name {
        return true;
    }
    descriptor.excluded_intents.contains(&profile.intent.kind)
}

/// Pure merge: weighted sum per table id across strategy lists, then
/// de-duplicate, rank, and truncate to the top `k`. Ties break on table id
/// so the ranking is deterministic.
fn merge_candidates(
    weighted: [(&'static str, f32, Vec<TableCandidate>); 4],
    k: usize,
) -> Vec<TableCandidate> {
    let mut merged: BTreeMap<String, TableCandidate> = BTreeMap::new();

    for (strategy, weight, list) in weighted {
        for table in list {
            let contribution = weight * table.score.clamp(0.0, 1.0);
            let entry = merged.entry(table.id.clone()).or_insert_with(|| TableCandidate {
                score: 0.0,
                score_breakdown: BTreeMap::new(),
                ..table.clone()
            });
            entry.score += contribution;
            entry
                .score_breakdown
                .insert(strategy.to_string(), table.score.clamp(0.0, 1.0));
        }
    }

    let mut tables: Vec<TableCandidate> = merged
        .into_values()
        .map(|mut t| {
            t.score = t.score.clamp(0.0, 1.0);
            t
        })
        .collect();
    tables.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    tables.truncate(k);
    tables
}
