//! Prompt templates — named slots filled by the assembler.
//!
//! Templates come from a static repository or are synthesized per request;
//! either way a template is immutable once selected.

use serde::{Deserialize, Serialize};

use crate::profile::IntentKind;

/// A named template slot. Slots are filled in this declaration order —
/// the assembler never reorders them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    BusinessContext,
    SchemaContext,
    Rules,
    Examples,
    Question,
}

impl SlotKind {
    /// Placeholder text as it appears in a template body.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::BusinessContext => "{business_context}",
            Self::SchemaContext => "{schema_context}",
            Self::Rules => "{rules}",
            Self::Examples => "{examples}",
            Self::Question => "{question}",
        }
    }
}

/// Where a template came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrigin {
    /// Drawn from the static template repository.
    Static,
    /// Synthesized dynamically for this request.
    Synthesized,
}

/// A worked question→query example attached to the template corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkedExample {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intent_tags: Vec<IntentKind>,
}

/// A prompt template with named placeholder slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    /// Intents this template is written for.
    pub intent_tags: Vec<IntentKind>,
    /// Domains this template is written for. Empty = any domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_tags: Vec<String>,
    /// Slots in fill order.
    pub slots: Vec<SlotKind>,
    /// Body text containing each slot's placeholder exactly once.
    pub body: String,
    /// Estimated token overhead of the body with empty slots.
    pub overhead_tokens: usize,
    /// Editorial quality score in [0, 1].
    pub quality: f32,
    pub origin: TemplateOrigin,
}

impl PromptTemplate {
    /// Check that every declared slot's placeholder occurs in the body.
    pub fn slots_consistent(&self) -> bool {
        self.slots.iter().all(|s| self.body.contains(s.placeholder()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_strings() {
        assert_eq!(SlotKind::Question.placeholder(), "{question}");
        assert_eq!(SlotKind::SchemaContext.placeholder(), "{schema_context}");
    }

    #[test]
    fn slot_consistency_check() {
        let template = PromptTemplate {
            id: "t1".into(),
            name: "aggregation".into(),
            intent_tags: vec![IntentKind::Aggregation],
            domain_tags: vec![],
            slots: vec![SlotKind::SchemaContext, SlotKind::Question],
            body: "Schema:\n{schema_context}\n\nQuestion: {question}\n".into(),
            overhead_tokens: 8,
            quality: 0.9,
            origin: TemplateOrigin::Static,
        };
        assert!(template.slots_consistent());

        let broken = PromptTemplate {
            slots: vec![SlotKind::Rules],
            ..template
        };
        assert!(!broken.slots_consistent());
    }
}
