//! The business context profile — the structured interpretation of a
//! natural-language question.
//!
//! Produced once per request by the Context Analyzer and **immutable**
//! afterwards; every downstream stage reads it, none mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall confidence weighting: intent, domain, mean entity confidence.
const INTENT_WEIGHT: f32 = 0.3;
const DOMAIN_WEIGHT: f32 = 0.3;
const ENTITY_WEIGHT: f32 = 0.4;

/// The kind of question being asked. A closed enum — intent is never
/// compared as a string anywhere in the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Exploratory analysis ("why did X change").
    Analytical,
    /// Operational lookups ("list open accounts").
    Operational,
    /// Aggregations ("total deposits by country").
    Aggregation,
    /// Side-by-side comparison ("UK vs DE revenue").
    Comparison,
    /// Time-series direction ("signup trend this quarter").
    Trend,
    /// Classification failed or was ambiguous.
    Unknown,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analytical => write!(f, "analytical"),
            Self::Operational => write!(f, "operational"),
            Self::Aggregation => write!(f, "aggregation"),
            Self::Comparison => write!(f, "comparison"),
            Self::Trend => write!(f, "trend"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classified intent with confidence and optional sub-intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    /// Normalized confidence in [0, 1].
    pub confidence: f32,
    /// Secondary intents, strongest first (e.g. Aggregation + Trend).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_intents: Vec<IntentKind>,
}

impl Intent {
    /// The low-confidence fallback used when classification degrades.
    pub fn unknown() -> Self {
        Self {
            kind: IntentKind::Unknown,
            confidence: 0.3,
            sub_intents: Vec::new(),
        }
    }
}

/// The best domain match for a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainMatch {
    /// Domain name from the descriptor registry (e.g. "banking").
    pub name: String,
    /// Normalized relevance score in [0, 1].
    pub score: f32,
    /// Key concepts of the matched domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_concepts: Vec<String>,
}

impl DomainMatch {
    /// The low-confidence fallback used when detection degrades.
    pub fn uncategorized() -> Self {
        Self {
            name: "uncategorized".into(),
            score: 0.2,
            key_concepts: Vec::new(),
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.name == "uncategorized"
    }
}

/// What kind of thing an extracted entity refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Column,
    Metric,
    Dimension,
    TimeExpression,
    Comparison,
}

/// Byte span of an entity mention within the original question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

/// A business entity mention extracted from the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessEntity {
    /// The mention as found in the question (normalized to lowercase).
    pub name: String,
    pub kind: EntityKind,
    /// Where in the question the mention occurred.
    pub span: SourceSpan,
    /// Table this entity resolved to, when the classifier knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_table: Option<String>,
    /// Column this entity resolved to, when the classifier knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_column: Option<String>,
    /// Normalized confidence in [0, 1].
    pub confidence: f32,
}

/// A matched business glossary term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: String,
    pub definition: String,
    pub score: f32,
}

/// Time granularity of a parsed time range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// A normalized time range parsed from the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
    /// The original expression ("yesterday", "2025-01-01 to 2025-02-01").
    pub expression: String,
    pub granularity: TimeGranularity,
}

/// The structured interpretation of a natural-language question.
///
/// Created once per request; immutable after the analyzer finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContextProfile {
    /// The original question, untouched.
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub intent: Intent,
    pub domain: DomainMatch,
    /// Extracted entities in question order.
    pub entities: Vec<BusinessEntity>,
    /// Matched glossary terms.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<TermMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Overall confidence: 0.3·intent + 0.3·domain + 0.4·mean(entity).
    pub confidence: f32,
    /// True when any sub-analysis fell back to its rule-based default.
    #[serde(default)]
    pub degraded: bool,
}

impl BusinessContextProfile {
    /// Combine sub-analysis confidences into the overall profile confidence.
    ///
    /// With no entities extracted, the entity component contributes zero —
    /// an entity-free profile is inherently low-confidence.
    pub fn combine_confidence(intent: &Intent, domain: &DomainMatch, entities: &[BusinessEntity]) -> f32 {
        let entity_mean = if entities.is_empty() {
            0.0
        } else {
            entities.iter().map(|e| e.confidence).sum::<f32>() / entities.len() as f32
        };
        (INTENT_WEIGHT * intent.confidence + DOMAIN_WEIGHT * domain.score + ENTITY_WEIGHT * entity_mean)
            .clamp(0.0, 1.0)
    }

    /// Entity names of a given kind, in question order.
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &BusinessEntity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}
