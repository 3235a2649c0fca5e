//! The Prompt Assembler — merges selected sections into template slots.
//!
//! Slots are filled in the template's fixed order; rendering never trusts
//! upstream token estimates, recounting the final text exactly with the
//! same estimator the optimizer budgeted with. Given identical inputs the
//! output is byte-identical — required for testability and safe caching.

use std::sync::Arc;
use tracing::debug;

use promptforge_assembly::{AssemblyResult, SelectedSection};
use promptforge_core::profile::BusinessContextProfile;
use promptforge_core::scoring::ScoringStrategy;
use promptforge_core::section::{ContextSection, SectionKind};
use promptforge_core::template::{PromptTemplate, SlotKind, WorkedExample};
use promptforge_core::token::estimate_tokens;

/// Bonus for an example tagged with the profile's primary intent.
const EXAMPLE_INTENT_BONUS: f32 = 0.2;

/// The final rendered prompt with its exact token recount.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub text: String,
    /// Exact recount of `text` — not the sum of upstream estimates.
    pub token_count: usize,
    /// Worked examples that made it into the prompt, as sections for
    /// trace bookkeeping.
    pub examples: Vec<ContextSection>,
}

/// Merges sections, examples, and the question into the template.
pub struct PromptAssembler {
    scorer: Arc<dyn ScoringStrategy>,
    max_examples: usize,
}

impl PromptAssembler {
    pub fn new(scorer: Arc<dyn ScoringStrategy>, max_examples: usize) -> Self {
        Self {
            scorer,
            max_examples,
        }
    }

    /// Render the final prompt text.
    ///
    /// Every schema section comes from `selection` — the assembler adds
    /// nothing the optimizer did not select.
    pub fn render(
        &self,
        profile: &BusinessContextProfile,
        template: &PromptTemplate,
        selection: &AssemblyResult,
        example_corpus: &[WorkedExample],
    ) -> RenderedPrompt {
        let rules_has_slot = template.slots.contains(&SlotKind::Rules);
        let examples = if template.slots.contains(&SlotKind::Examples) {
            self.rank_examples(profile, example_corpus)
        } else {
            Vec::new()
        };

        let mut text = template.body.clone();
        for slot in &template.slots {
            let filling = match slot {
                SlotKind::BusinessContext => business_context(profile),
                SlotKind::SchemaContext => {
                    schema_context(&selection.sections, rules_has_slot)
                }
                SlotKind::Rules => rules_text(&selection.sections),
                SlotKind::Examples => examples_text(&examples),
                SlotKind::Question => profile.question.clone(),
            };
            text = text.replacen(slot.placeholder(), &filling, 1);
        }

        let token_count = estimate_tokens(&text);
        debug!(
            token_count,
            sections = selection.sections.len(),
            examples = examples.len(),
            template = %template.id,
            "prompt rendered"
        );

        RenderedPrompt {
            text,
            token_count,
            examples,
        }
    }

    /// Rank the example corpus against the profile with the same scoring
    /// strategy used for schema sections, keeping at most `max_examples`.
    fn rank_examples(
        &self,
        profile: &BusinessContextProfile,
        corpus: &[WorkedExample],
    ) -> Vec<ContextSection> {
        let mut scored: Vec<(usize, f32)> = corpus
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut score = self.scorer.similarity(&profile.question, &e.question);
                if e.intent_tags.contains(&profile.intent.kind) {
                    score += EXAMPLE_INTENT_BONUS;
                }
                (i, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.max_examples);

        scored
            .into_iter()
            .map(|(i, score)| {
                let example = &corpus[i];
                let text = format!("Q: {}\nA:\n{}", example.question, example.answer);
                let token_cost = estimate_tokens(&text);
                ContextSection {
                    id: format!("example:{i}"),
                    kind: SectionKind::Example,
                    source_table: None,
                    text,
                    relevance: score.clamp(0.0, 1.0),
                    importance: 0.5,
                    token_cost,
                    essential: false,
                    compressed: None,
                }
            })
            .collect()
    }
}

/// Deterministic business-context block from the profile.
fn business_context(profile: &BusinessContextProfile) -> String {
    let mut lines = vec![
        format!(
            "Intent: {} (confidence {:.2})",
            profile.intent.kind, profile.intent.confidence
        ),
        format!("Domain: {}", profile.domain.name),
    ];
    if let Some(range) = &profile.time_range {
        lines.push(format!(
            "Time range: {} ({:?})",
            range.expression, range.granularity
        ));
    }
    if !profile.entities.is_empty() {
        let entities: Vec<String> = profile
            .entities
            .iter()
            .map(|e| format!("{} ({:?})", e.name, e.kind))
            .collect();
        lines.push(format!("Entities: {}", entities.join(", ")));
    }
    if profile.degraded {
        lines.push("Note: analysis used fallback classification.".into());
    }
    lines.join("\n")
}

/// Non-rule sections in selection order. When the template has no Rules
/// slot, rule sections fold in here so a selected essential rule never
/// silently vanishes.
fn schema_context(sections: &[SelectedSection], rules_have_own_slot: bool) -> String {
    let parts: Vec<&str> = sections
        .iter()
        .filter(|s| !(rules_have_own_slot && s.section.kind == SectionKind::Rule))
        .map(SelectedSection::text)
        .collect();
    if parts.is_empty() {
        "(no schema context selected)".into()
    } else {
        parts.join("\n\n")
    }
}

fn rules_text(sections: &[SelectedSection]) -> String {
    let parts: Vec<&str> = sections
        .iter()
        .filter(|s| s.section.kind == SectionKind::Rule)
        .map(SelectedSection::text)
        .collect();
    if parts.is_empty() {
        "(none)".into()
    } else {
        parts.join("\n")
    }
}

fn examples_text(examples: &[ContextSection]) -> String {
    if examples.is_empty() {
        "(none)".into()
    } else {
        examples
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
