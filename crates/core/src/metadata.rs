//! Metadata store traits — the abstraction over the external schema
//! catalog and the relationship-discovery service.
//!
//! The store lives on the far side of a process boundary; every lookup
//! takes the request deadline. Errors here mean "unavailable", and the
//! retrieval engine recovers by returning whatever partial candidate set
//! it has accumulated — it never fails the request.

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::RetrievalError;
use crate::schema::{BusinessRule, ColumnInfo, GlossaryTerm, TableCandidate, TableRelationship};

/// Lookup interface of the external metadata catalog.
///
/// Each discovery strategy calls exactly one of the `tables_*` methods;
/// scores returned by the store are normalized to [0, 1].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// A human-readable name for this store (e.g. "warehouse-catalog").
    fn name(&self) -> &str;

    /// Tables scored by semantic similarity between `query` and their
    /// descriptions.
    async fn tables_by_semantic(
        &self,
        query: &str,
        deadline: Deadline,
    ) -> std::result::Result<Vec<TableCandidate>, RetrievalError>;

    /// Tables carrying the given domain tag.
    async fn tables_by_domain(
        &self,
        domain: &str,
        deadline: Deadline,
    ) -> std::result::Result<Vec<TableCandidate>, RetrievalError>;

    /// Tables whose name or columns match the given entity names.
    async fn tables_by_entities(
        &self,
        entities: &[String],
        deadline: Deadline,
    ) -> std::result::Result<Vec<TableCandidate>, RetrievalError>;

    /// Tables referenced by the given glossary terms.
    async fn tables_by_terms(
        &self,
        terms: &[String],
        deadline: Deadline,
    ) -> std::result::Result<Vec<TableCandidate>, RetrievalError>;

    /// All columns of a table, including governance flags.
    async fn columns_of(
        &self,
        table_id: &str,
        deadline: Deadline,
    ) -> std::result::Result<Vec<ColumnInfo>, RetrievalError>;

    /// Glossary terms matching the question.
    async fn glossary_for(
        &self,
        query: &str,
        deadline: Deadline,
    ) -> std::result::Result<Vec<GlossaryTerm>, RetrievalError>;

    /// Business rules attached to any of the given tables.
    async fn rules_for(
        &self,
        table_ids: &[String],
        deadline: Deadline,
    ) -> std::result::Result<Vec<BusinessRule>, RetrievalError>;
}

/// Foreign-key / inferred join discovery among a set of tables.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    async fn relationships_among(
        &self,
        table_ids: &[String],
        deadline: Deadline,
    ) -> std::result::Result<Vec<TableRelationship>, RetrievalError>;
}

/// A schema-change notification consumed by the retrieval cache.
///
/// Emitted by the surrounding system when the catalog changes; this core
/// only reacts by invalidating cached retrieval results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// A single table changed (columns, tags, description).
    Table(String),
    /// The whole catalog changed (bulk import, migration).
    Full,
}
