//! # PromptForge Core
//!
//! Domain types, traits, and error definitions for the PromptForge prompt
//! construction pipeline. This crate has **zero framework dependencies** —
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (metadata store, text classifier, trace
//! store, cache) is defined as a trait here. Implementations live in their
//! respective crates or in the embedding application. This enables:
//! - Swapping collaborators via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod cache;
pub mod classifier;
pub mod deadline;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod profile;
pub mod schema;
pub mod scoring;
pub mod section;
pub mod template;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use cache::{Cache, InMemoryTtlCache};
pub use classifier::{ClassificationRequest, ClassificationTask, Hypothesis, TextClassifier};
pub use deadline::Deadline;
pub use error::{Error, Result, TerminalFailure};
pub use metadata::{MetadataStore, RelationshipSource, SchemaChange};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use profile::{
    BusinessContextProfile, BusinessEntity, DomainMatch, EntityKind, Intent, IntentKind,
    SourceSpan, TermMatch, TimeGranularity, TimeRange,
};
pub use schema::{
    BusinessRule, ColumnInfo, ContextualSchema, DomainDescriptor, GlossaryTerm, Governance,
    RelationshipKind, RetrievalOutcome, TableCandidate, TableRelationship,
};
pub use scoring::{LexicalScorer, ScoringStrategy};
pub use section::{CompressedVariant, ContextSection, SectionKind};
pub use template::{PromptTemplate, SlotKind, TemplateOrigin, WorkedExample};
