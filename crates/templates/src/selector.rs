//! Template selection and dynamic synthesis.
//!
//! Static templates are scored against the profile's intent and domain;
//! the best one wins if it clears the quality threshold. Otherwise a
//! dynamic template is synthesized from composable slots, tailored to the
//! caller's preferences. `TemplateNotFound` is terminal and only reachable
//! when synthesis is disabled and the static corpus has no match.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use promptforge_core::error::TerminalFailure;
use promptforge_core::profile::BusinessContextProfile;
use promptforge_core::template::{PromptTemplate, SlotKind, TemplateOrigin};
use promptforge_core::token::estimate_template_overhead;

use crate::repository::TemplateRepository;

/// How much prose the synthesized template carries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Minimal,
    #[default]
    Standard,
    Detailed,
}

/// Caller preferences for template selection and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionPreferences {
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default = "default_true")]
    pub include_rules: bool,
    #[serde(default = "default_true")]
    pub include_examples: bool,
    /// When false, a static miss is a terminal `TemplateNotFound`.
    #[serde(default = "default_true")]
    pub allow_synthesis: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SelectionPreferences {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Standard,
            include_rules: true,
            include_examples: true,
            allow_synthesis: true,
        }
    }
}

/// The selected template and the score that won it.
#[derive(Debug, Clone)]
pub struct TemplateChoice {
    pub template: PromptTemplate,
    pub score: f32,
}

/// The Template Selector.
pub struct TemplateSelector {
    quality_threshold: f32,
}

impl TemplateSelector {
    pub fn new(quality_threshold: f32) -> Self {
        Self { quality_threshold }
    }

    /// Choose (or synthesize) a template for the profile.
    pub fn select(
        &self,
        repository: &TemplateRepository,
        profile: &BusinessContextProfile,
        prefs: &SelectionPreferences,
    ) -> Result<TemplateChoice, TerminalFailure> {
        let best = repository
            .templates()
            .iter()
            .map(|t| (t, score_template(t, profile)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((template, score)) = best {
            if score >= self.quality_threshold {
                info!(template = %template.id, score, "static template selected");
                return Ok(TemplateChoice {
                    template: template.clone(),
                    score,
                });
            }
            debug!(
                template = %template.id,
                score,
                threshold = self.quality_threshold,
                "best static template below threshold"
            );
        }

        if prefs.allow_synthesis {
            let template = synthesize(profile, prefs);
            info!(template = %template.id, "dynamic template synthesized");
            return Ok(TemplateChoice {
                score: template.quality,
                template,
            });
        }

        Err(TerminalFailure::TemplateNotFound {
            intent: profile.intent.kind.to_string(),
        })
    }
}

/// Score a static template: intent tag fit weighted by editorial quality,
/// plus a domain tag bonus. Untagged domains fit everything.
fn score_template(template: &PromptTemplate, profile: &BusinessContextProfile) -> f32 {
    let intent_fit = if template.intent_tags.contains(&profile.intent.kind) {
        1.0
    } else if profile
        .intent
        .sub_intents
        .iter()
        .any(|s| template.intent_tags.contains(s))
    {
        0.6
    } else {
        0.0
    };

    let domain_fit = if template.domain_tags.is_empty()
        || template.domain_tags.contains(&profile.domain.name)
    {
        1.0
    } else {
        0.3
    };

    (0.7 * intent_fit * template.quality + 0.3 * domain_fit * template.quality).clamp(0.0, 1.0)
}

/// Build a dynamic template from the ordered slot list, honoring the
/// caller's verbosity and inclusion preferences.
fn synthesize(profile: &BusinessContextProfile, prefs: &SelectionPreferences) -> PromptTemplate {
    let mut slots = vec![SlotKind::BusinessContext, SlotKind::SchemaContext];
    if prefs.include_rules {
        slots.push(SlotKind::Rules);
    }
    if prefs.include_examples {
        slots.push(SlotKind::Examples);
    }
    slots.push(SlotKind::Question);

    let mut body = String::new();
    if prefs.verbosity != Verbosity::Minimal {
        body.push_str("You are an expert SQL analyst for a business data warehouse.\n\n");
    }
    for slot in &slots {
        match (slot, prefs.verbosity) {
            (SlotKind::BusinessContext, Verbosity::Minimal) => {
                body.push_str("Context:\n{business_context}\n\n");
            }
            (SlotKind::BusinessContext, _) => {
                body.push_str("## Business context\n{business_context}\n\n");
            }
            (SlotKind::SchemaContext, Verbosity::Minimal) => {
                body.push_str("Schema:\n{schema_context}\n\n");
            }
            (SlotKind::SchemaContext, _) => {
                body.push_str("## Schema\n{schema_context}\n\n");
            }
            (SlotKind::Rules, Verbosity::Minimal) => {
                body.push_str("Rules:\n{rules}\n\n");
            }
            (SlotKind::Rules, _) => {
                body.push_str("## Rules\n{rules}\n\n");
            }
            (SlotKind::Examples, Verbosity::Minimal) => {
                body.push_str("Examples:\n{examples}\n\n");
            }
            (SlotKind::Examples, _) => {
                body.push_str("## Examples\n{examples}\n\n");
            }
            (SlotKind::Question, Verbosity::Detailed) => {
                body.push_str(
                    "## Task\nWrite one SQL query answering: {question}\n\
                     Prefer explicit joins, qualify every column, and keep the query readable.\n",
                );
            }
            (SlotKind::Question, _) => {
                body.push_str("## Task\nWrite one SQL query answering: {question}\n");
            }
        }
    }

    let mut template = PromptTemplate {
        id: format!("synth:{}", profile.intent.kind),
        name: format!("synthesized-{}", profile.intent.kind),
        intent_tags: vec![profile.intent.kind],
        domain_tags: vec![profile.domain.name.clone()],
        slots,
        body,
        overhead_tokens: 0,
        quality: 0.75,
        origin: TemplateOrigin::Synthesized,
    };
    template.overhead_tokens = estimate_template_overhead(&template);
    template
}
