//! Intent classification with rule-based fallback.
//!
//! The primary path asks the external classifier to choose among the
//! closed intent set. When that call fails or overruns the deadline, the
//! keyword fallback takes over at reduced confidence — the analyzer never
//! propagates a classifier failure.

use tracing::debug;

use promptforge_core::classifier::{ClassificationRequest, ClassificationTask, TextClassifier};
use promptforge_core::deadline::Deadline;
use promptforge_core::profile::{Intent, IntentKind};

/// Confidence assigned to a keyword-rule hit.
const FALLBACK_CONFIDENCE: f32 = 0.5;
/// Minimum classifier confidence for a secondary hypothesis to become a
/// sub-intent.
const SUB_INTENT_FLOOR: f32 = 0.3;

const INTENT_LABELS: [(&str, IntentKind); 5] = [
    ("analytical", IntentKind::Analytical),
    ("operational", IntentKind::Operational),
    ("aggregation", IntentKind::Aggregation),
    ("comparison", IntentKind::Comparison),
    ("trend", IntentKind::Trend),
];

fn kind_from_label(label: &str) -> Option<IntentKind> {
    INTENT_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, kind)| *kind)
}

/// Classify the question's intent. Returns the intent and whether the
/// rule-based fallback was used.
pub async fn classify_intent(
    classifier: &dyn TextClassifier,
    question: &str,
    deadline: Deadline,
) -> (Intent, bool) {
    let request = ClassificationRequest {
        task: ClassificationTask::Intent,
        text: question.to_string(),
        labels: INTENT_LABELS.iter().map(|(name, _)| name.to_string()).collect(),
    };

    let hypotheses = deadline
        .bound(classifier.classify(request, deadline))
        .await
        .and_then(|result| result.ok())
        .unwrap_or_default();

    match hypotheses.split_first() {
        Some((top, rest)) => match kind_from_label(&top.label) {
            Some(kind) => {
                let sub_intents = rest
                    .iter()
                    .filter(|h| h.confidence >= SUB_INTENT_FLOOR)
                    .filter_map(|h| kind_from_label(&h.label))
                    .collect();
                (
                    Intent {
                        kind,
                        confidence: top.confidence.clamp(0.0, 1.0),
                        sub_intents,
                    },
                    false,
                )
            }
            None => {
                debug!(label = %top.label, "classifier returned unknown intent label");
                (fallback_intent(question), true)
            }
        },
        None => (fallback_intent(question), true),
    }
}

/// Keyword-rule intent classification, used when the classifier degrades.
///
/// Rules are checked in precedence order; the first hit becomes the
/// primary intent and later hits become sub-intents.
pub fn fallback_intent(question: &str) -> Intent {
    let q = question.to_lowercase();

    let rules: [(IntentKind, &[&str]); 5] = [
        (
            IntentKind::Comparison,
            &["compare", "versus", " vs ", "difference between"],
        ),
        (
            IntentKind::Trend,
            &["trend", "over time", "growth", "increase", "decrease"],
        ),
        (
            IntentKind::Aggregation,
            &["total", "sum", "count", "top ", "average", "how many", "most"],
        ),
        (
            IntentKind::Analytical,
            &["why", "analyze", "analysis", "breakdown", "root cause"],
        ),
        (
            IntentKind::Operational,
            &["list", "show", "status", "open", "active"],
        ),
    ];

    let hits: Vec<IntentKind> = rules
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| q.contains(k)))
        .map(|(kind, _)| *kind)
        .collect();

    match hits.split_first() {
        Some((first, rest)) => Intent {
            kind: *first,
            confidence: FALLBACK_CONFIDENCE,
            sub_intents: rest.to_vec(),
        },
        None => Intent::unknown(),
    }
}
