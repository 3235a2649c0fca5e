//! The static template corpus.
//!
//! Template CRUD lives outside this core; this repository is the read
//! view the selector scores against, seeded with a built-in corpus per
//! intent. Worked examples sit alongside the templates they illustrate.

use promptforge_core::profile::IntentKind;
use promptforge_core::template::{PromptTemplate, SlotKind, TemplateOrigin, WorkedExample};
use promptforge_core::token::estimate_template_overhead;

/// Read view over static templates and worked examples.
pub struct TemplateRepository {
    templates: Vec<PromptTemplate>,
    examples: Vec<WorkedExample>,
}

impl TemplateRepository {
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// The built-in corpus: one template per concrete intent, plus a small
    /// worked-example set.
    pub fn with_defaults() -> Self {
        let mut repo = Self::empty();

        repo.add_template(make_template(
            "static:aggregation",
            "aggregation",
            vec![IntentKind::Aggregation],
            "You are an expert SQL analyst for a business data warehouse.\n\n\
             ## Business context\n{business_context}\n\n\
             ## Schema\n{schema_context}\n\n\
             ## Rules\n{rules}\n\n\
             ## Examples\n{examples}\n\n\
             ## Task\nWrite one SQL query answering: {question}\n\
             Aggregate precisely, name result columns clearly, and include only needed joins.\n",
            0.9,
        ));
        repo.add_template(make_template(
            "static:trend",
            "trend",
            vec![IntentKind::Trend],
            "You are an expert SQL analyst for a business data warehouse.\n\n\
             ## Business context\n{business_context}\n\n\
             ## Schema\n{schema_context}\n\n\
             ## Rules\n{rules}\n\n\
             ## Examples\n{examples}\n\n\
             ## Task\nWrite one SQL query answering: {question}\n\
             Bucket results by the requested time grain and order chronologically.\n",
            0.88,
        ));
        repo.add_template(make_template(
            "static:comparison",
            "comparison",
            vec![IntentKind::Comparison],
            "You are an expert SQL analyst for a business data warehouse.\n\n\
             ## Business context\n{business_context}\n\n\
             ## Schema\n{schema_context}\n\n\
             ## Rules\n{rules}\n\n\
             ## Examples\n{examples}\n\n\
             ## Task\nWrite one SQL query answering: {question}\n\
             Return the compared groups side by side with explicit labels.\n",
            0.87,
        ));
        repo.add_template(make_template(
            "static:operational",
            "operational",
            vec![IntentKind::Operational, IntentKind::Analytical],
            "You are an expert SQL analyst for a business data warehouse.\n\n\
             ## Business context\n{business_context}\n\n\
             ## Schema\n{schema_context}\n\n\
             ## Rules\n{rules}\n\n\
             ## Examples\n{examples}\n\n\
             ## Task\nWrite one SQL query answering: {question}\n",
            0.85,
        ));

        repo.add_example(WorkedExample {
            question: "Total deposits yesterday".into(),
            answer: "SELECT SUM(amount) AS total_deposits\nFROM transactions\n\
                     WHERE transaction_type = 'deposit'\n  AND status = 'completed'\n\
                     AND created_at >= CURRENT_DATE - INTERVAL '1 day'\n  AND created_at < CURRENT_DATE;"
                .into(),
            intent_tags: vec![IntentKind::Aggregation],
        });
        repo.add_example(WorkedExample {
            question: "Top 5 countries by deposit amount last week".into(),
            answer: "SELECT p.country_code, SUM(t.amount) AS total\nFROM transactions t\n\
                     JOIN players p ON p.id = t.player_id\n\
                     WHERE t.transaction_type = 'deposit'\nGROUP BY p.country_code\n\
                     ORDER BY total DESC\nLIMIT 5;"
                .into(),
            intent_tags: vec![IntentKind::Aggregation],
        });
        repo.add_example(WorkedExample {
            question: "Daily signup trend this month".into(),
            answer: "SELECT DATE(registered_at) AS day, COUNT(*) AS signups\nFROM players\n\
                     WHERE registered_at >= DATE_TRUNC('month', CURRENT_DATE)\n\
                     GROUP BY day\nORDER BY day;"
                .into(),
            intent_tags: vec![IntentKind::Trend],
        });

        repo
    }

    pub fn add_template(&mut self, template: PromptTemplate) {
        debug_assert!(template.slots_consistent(), "template slots must match body");
        self.templates.push(template);
    }

    pub fn add_example(&mut self, example: WorkedExample) {
        self.examples.push(example);
    }

    pub fn templates(&self) -> &[PromptTemplate] {
        &self.templates
    }

    pub fn examples(&self) -> &[WorkedExample] {
        &self.examples
    }
}

impl Default for TemplateRepository {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn make_template(
    id: &str,
    name: &str,
    intent_tags: Vec<IntentKind>,
    body: &str,
    quality: f32,
) -> PromptTemplate {
    let mut template = PromptTemplate {
        id: id.into(),
        name: name.into(),
        intent_tags,
        domain_tags: vec![],
        slots: vec![
            SlotKind::BusinessContext,
            SlotKind::SchemaContext,
            SlotKind::Rules,
            SlotKind::Examples,
            SlotKind::Question,
        ],
        body: body.into(),
        overhead_tokens: 0,
        quality,
        origin: TemplateOrigin::Static,
    };
    template.overhead_tokens = estimate_template_overhead(&template);
    template
}
