//! Domain detection against the descriptor registry.
//!
//! Pure scoring, no external call: each descriptor is scored through the
//! pluggable `ScoringStrategy` against the question, and the best match
//! above the floor wins. Below the floor the question is Uncategorized —
//! a low-confidence value, not an error.

use promptforge_core::profile::DomainMatch;
use promptforge_core::schema::DomainDescriptor;
use promptforge_core::scoring::ScoringStrategy;

/// Weighting of the description match vs the key-concept match.
const DESCRIPTION_WEIGHT: f32 = 0.6;
const CONCEPT_WEIGHT: f32 = 0.4;
/// Below this combined score a question is Uncategorized.
const MATCH_FLOOR: f32 = 0.15;

/// Detect the best-matching domain. Returns the match and whether
/// detection degraded to Uncategorized.
pub fn detect_domain(
    scorer: &dyn ScoringStrategy,
    registry: &[DomainDescriptor],
    question: &str,
) -> (DomainMatch, bool) {
    let best = registry
        .iter()
        .map(|d| (d, score_descriptor(scorer, d, question)))
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((descriptor, score)) if score >= MATCH_FLOOR => (
            DomainMatch {
                name: descriptor.name.clone(),
                score: score.clamp(0.0, 1.0),
                key_concepts: descriptor.key_concepts.clone(),
            },
            false,
        ),
        _ => (DomainMatch::uncategorized(), true),
    }
}

fn score_descriptor(scorer: &dyn ScoringStrategy, d: &DomainDescriptor, question: &str) -> f32 {
    let description = scorer.similarity(question, &d.description);
    let concepts = scorer.keyword_similarity(question, &d.key_concepts);
    DESCRIPTION_WEIGHT * description + CONCEPT_WEIGHT * concepts
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_core::scoring::LexicalScorer;

    fn registry() -> Vec<DomainDescriptor> {
        vec![
            DomainDescriptor {
                name: "banking".into(),
                description: "Deposits, withdrawals, payments and account balances".into(),
                key_concepts: vec!["deposits".into(), "payments".into(), "accounts".into()],
                exclusive: false,
                excluded_intents: vec![],
            },
            DomainDescriptor {
                name: "gaming".into(),
                description: "Gameplay sessions, rounds, bets and game catalog".into(),
                key_concepts: vec!["sessions".into(), "rounds".into(), "games".into()],
                exclusive: true,
                excluded_intents: vec![],
            },
        ]
    }

    #[test]
    fn picks_the_matching_domain() {
        let (matched, degraded) = detect_domain(
            &LexicalScorer,
            &registry(),
            "Total deposits by country last week",
        );
        assert!(!degraded);
        assert_eq!(matched.name, "banking");
        assert!(matched.score > 0.0);
    }

    #[test]
    fn gaming_question_matches_gaming() {
        let (matched, _) = detect_domain(
            &LexicalScorer,
            &registry(),
            "How many gameplay sessions were played",
        );
        assert_eq!(matched.name, "gaming");
    }

    #[test]
    fn unrelated_question_is_uncategorized() {
        let (matched, degraded) =
            detect_domain(&LexicalScorer, &registry(), "hello there friend");
        assert!(degraded);
        assert!(matched.is_uncategorized());
        assert!(matched.score < 0.5);
    }

    #[test]
    fn empty_registry_is_uncategorized() {
        let (matched, degraded) = detect_domain(&LexicalScorer, &[], "total deposits");
        assert!(degraded);
        assert!(matched.is_uncategorized());
    }
}
