//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, accurate
//! within ~10% for BPE tokenizers on English text. The same functions are
//! used both for candidate cost estimates and for the assembler's exact
//! recount over final prompt text, so the budget invariant holds under one
//! consistent measure.

use crate::section::ContextSection;
use crate::template::PromptTemplate;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a section's uncompressed text, including the
/// per-section separator overhead added at assembly.
pub fn estimate_section_tokens(section: &ContextSection) -> usize {
    estimate_tokens(&section.text) + 2
}

/// Estimate the overhead of a template body with all slots empty.
pub fn estimate_template_overhead(template: &PromptTemplate) -> usize {
    let mut body = template.body.clone();
    for slot in &template.slots {
        body = body.replace(slot.placeholder(), "");
    }
    estimate_tokens(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::IntentKind;
    use crate::section::SectionKind;
    use crate::template::{SlotKind, TemplateOrigin};

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn section_includes_separator_overhead() {
        let section = ContextSection {
            id: "s".into(),
            kind: SectionKind::Glossary,
            source_table: None,
            text: "test".into(), // 4 chars → 1 token
            relevance: 0.5,
            importance: 0.5,
            token_cost: 1,
            essential: false,
            compressed: None,
        };
        assert_eq!(estimate_section_tokens(&section), 3);
    }

    #[test]
    fn template_overhead_excludes_slots() {
        let template = PromptTemplate {
            id: "t".into(),
            name: "t".into(),
            intent_tags: vec![IntentKind::Aggregation],
            domain_tags: vec![],
            slots: vec![SlotKind::Question],
            body: "Answer: {question}".into(),
            overhead_tokens: 0,
            quality: 1.0,
            origin: TemplateOrigin::Static,
        };
        // "Answer: " is 8 chars → 2 tokens
        assert_eq!(estimate_template_overhead(&template), 2);
    }
}
