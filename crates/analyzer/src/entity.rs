//! Entity extraction — table/column/metric/dimension/time/comparison
//! mentions, each tagged with its source span.
//!
//! The classifier path labels spans directly; the lexicon fallback scans
//! for known business vocabulary at word boundaries. Either way, entities
//! come back in question order.

use tracing::debug;

use promptforge_core::classifier::{ClassificationRequest, ClassificationTask, TextClassifier};
use promptforge_core::deadline::Deadline;
use promptforge_core::profile::{BusinessEntity, EntityKind, SourceSpan};

/// Confidence assigned to lexicon-scan hits.
const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Business vocabulary for the fallback scan.
const LEXICON: [(&str, EntityKind); 22] = [
    ("deposit", EntityKind::Metric),
    ("depositor", EntityKind::Metric),
    ("withdrawal", EntityKind::Metric),
    ("transaction", EntityKind::Metric),
    ("payment", EntityKind::Metric),
    ("revenue", EntityKind::Metric),
    ("balance", EntityKind::Metric),
    ("amount", EntityKind::Metric),
    ("session", EntityKind::Metric),
    ("player", EntityKind::Dimension),
    ("customer", EntityKind::Dimension),
    ("account", EntityKind::Dimension),
    ("country", EntityKind::Dimension),
    ("region", EntityKind::Dimension),
    ("currency", EntityKind::Dimension),
    ("channel", EntityKind::Dimension),
    ("yesterday", EntityKind::TimeExpression),
    ("today", EntityKind::TimeExpression),
    ("week", EntityKind::TimeExpression),
    ("month", EntityKind::TimeExpression),
    ("versus", EntityKind::Comparison),
    ("compare", EntityKind::Comparison),
];

fn kind_from_label(label: &str) -> Option<EntityKind> {
    match label {
        "table" => Some(EntityKind::Table),
        "column" => Some(EntityKind::Column),
        "metric" => Some(EntityKind::Metric),
        "dimension" => Some(EntityKind::Dimension),
        "time_expression" => Some(EntityKind::TimeExpression),
        "comparison" => Some(EntityKind::Comparison),
        _ => None,
    }
}

/// Extract entities from the question. Returns the entities and whether
/// the lexicon fallback was used.
pub async fn extract_entities(
    classifier: &dyn TextClassifier,
    question: &str,
    deadline: Deadline,
) -> (Vec<BusinessEntity>, bool) {
    let request = ClassificationRequest {
        task: ClassificationTask::Entities,
        text: question.to_string(),
        labels: Vec::new(),
    };

    match deadline.bound(classifier.classify(request, deadline)).await {
        Some(Ok(hypotheses)) if !hypotheses.is_empty() => {
            let mut entities: Vec<BusinessEntity> = hypotheses
                .iter()
                .filter_map(|h| {
                    let kind = kind_from_label(&h.label)?;
                    let (start, end) = h.span?;
                    let mention = question.get(start..end)?;
                    Some(BusinessEntity {
                        name: mention.to_lowercase(),
                        kind,
                        span: SourceSpan { start, end },
                        mapped_table: None,
                        mapped_column: None,
                        confidence: h.confidence.clamp(0.0, 1.0),
                    })
                })
                .collect();
            if entities.is_empty() {
                debug!("classifier entity hypotheses unusable, using lexicon fallback");
                return (fallback_entities(question), true);
            }
            entities.sort_by_key(|e| e.span.start);
            (entities, false)
        }
        _ => (fallback_entities(question), true),
    }
}

/// Lexicon scan at word boundaries. First occurrence of each word wins.
pub fn fallback_entities(question: &str) -> Vec<BusinessEntity> {
    let lower = question.to_lowercase();
    let mut entities = Vec::new();

    for (word, kind) in LEXICON {
        if let Some(start) = find_word(&lower, word) {
            // Extend to the end of the matched word in the original text
            // so plural forms keep their span ("depositors").
            let end = lower[start..]
                .find(|c: char| !c.is_alphanumeric())
                .map(|i| start + i)
                .unwrap_or(lower.len());
            entities.push(BusinessEntity {
                name: lower[start..end].to_string(),
                kind,
                span: SourceSpan { start, end },
                mapped_table: None,
                mapped_column: None,
                confidence: FALLBACK_CONFIDENCE,
            });
        }
    }

    // Question order; drop duplicate spans from overlapping lexicon words.
    entities.sort_by_key(|e| (e.span.start, e.span.end));
    entities.dedup_by_key(|e| e.span.start);
    entities
}

/// First word-boundary occurrence of `word` as a prefix of a word in `text`.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(pos) = text[from..].find(word) {
        let start = from + pos;
        let boundary_before =
            start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        if boundary_before {
            return Some(start);
        }
        from = start + word.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingClassifier, ScriptedClassifier};
    use promptforge_core::classifier::Hypothesis;
    use std::time::Duration;

    #[test]
    fn lexicon_finds_metric_and_dimension() {
        let entities = fallback_entities("Total deposits by country last week");
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"deposits"));
        assert!(names.contains(&"country"));
        assert!(names.contains(&"week"));

        let deposit = entities.iter().find(|e| e.name == "deposits").unwrap();
        assert_eq!(deposit.kind, EntityKind::Metric);
        assert_eq!(
            &"Total deposits by country last week"[deposit.span.start..deposit.span.end],
            "deposits"
        );
    }

    #[test]
    fn lexicon_keeps_question_order() {
        let entities = fallback_entities("country of each depositor");
        assert!(entities.len() >= 2);
        assert!(entities.windows(2).all(|w| w[0].span.start <= w[1].span.start));
        assert_eq!(entities[0].name, "country");
    }

    #[test]
    fn word_boundary_respected() {
        // "payment" inside "overpayments" is not a word-boundary match
        let entities = fallback_entities("overpayments only");
        assert!(entities.is_empty());
    }

    #[test]
    fn prefix_extends_to_full_word() {
        let entities = fallback_entities("top depositors");
        let depositor = entities.iter().find(|e| e.kind == EntityKind::Metric).unwrap();
        assert_eq!(depositor.name, "depositors");
    }

    #[tokio::test]
    async fn classifier_spans_are_used() {
        let question = "Top 10 depositors yesterday from UK";
        let classifier = ScriptedClassifier::entities(vec![
            Hypothesis {
                label: "metric".into(),
                confidence: 0.9,
                span: Some((7, 17)),
            },
            Hypothesis {
                label: "time_expression".into(),
                confidence: 0.8,
                span: Some((18, 27)),
            },
        ]);
        let deadline = Deadline::after(Duration::from_secs(1));
        let (entities, degraded) = extract_entities(&classifier, question, deadline).await;
        assert!(!degraded);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "depositors");
        assert_eq!(entities[1].kind, EntityKind::TimeExpression);
    }

    #[tokio::test]
    async fn classifier_failure_uses_lexicon() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let (entities, degraded) =
            extract_entities(&FailingClassifier, "total deposits by country", deadline).await;
        assert!(degraded);
        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| (e.confidence - 0.5).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn bad_spans_fall_back() {
        let classifier = ScriptedClassifier::entities(vec![Hypothesis {
            label: "metric".into(),
            confidence: 0.9,
            span: Some((500, 600)),
        }]);
        let deadline = Deadline::after(Duration::from_secs(1));
        let (entities, degraded) = extract_entities(&classifier, "total deposits", deadline).await;
        assert!(degraded);
        assert!(entities.iter().any(|e| e.name == "deposits"));
    }
}
