//! Pluggable scoring strategy.
//!
//! Every similarity and relevance computation in the pipeline goes through
//! this trait, so a learned scorer can replace the lexical default without
//! touching the stages. All scores are normalized to [0, 1].

use std::collections::HashSet;

/// Text-vs-text similarity used for domain detection, table ranking,
/// column selection, and example ranking.
pub trait ScoringStrategy: Send + Sync {
    /// Similarity between free text and a target description, in [0, 1].
    fn similarity(&self, text: &str, target: &str) -> f32;

    /// Similarity between free text and a bag of keywords, in [0, 1].
    /// Default: best single-keyword similarity.
    fn keyword_similarity(&self, text: &str, keywords: &[String]) -> f32 {
        keywords
            .iter()
            .map(|k| self.similarity(text, k))
            .fold(0.0_f32, f32::max)
    }
}

/// Deterministic lexical-overlap scorer: Jaccard overlap of lowercase word
/// sets, with a containment bonus for short targets. Not a semantic model —
/// it is the rule-based default the pipeline runs on when no embedding
/// scorer is plugged in.
pub struct LexicalScorer;

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

impl ScoringStrategy for LexicalScorer {
    fn similarity(&self, text: &str, target: &str) -> f32 {
        let a = words(text);
        let b = words(target);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let shared = a.intersection(&b).count();
        if shared == 0 {
            return 0.0;
        }
        let jaccard = shared as f32 / (a.len() + b.len() - shared) as f32;
        // Containment: a short target fully present in the text is a strong
        // match even when the text has many other words.
        let containment = shared as f32 / b.len().min(a.len()) as f32;
        jaccard.max(containment * 0.9).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_high() {
        let s = LexicalScorer;
        let score = s.similarity("total deposits by country", "total deposits by country");
        assert!(score > 0.8);
    }

    #[test]
    fn disjoint_text_scores_zero() {
        let s = LexicalScorer;
        assert_eq!(s.similarity("total deposits", "gameplay sessions"), 0.0);
    }

    #[test]
    fn contained_target_scores_well() {
        let s = LexicalScorer;
        let score = s.similarity(
            "show me total deposits by country for last week",
            "deposits country",
        );
        assert!(score > 0.5, "got {score}");
    }

    #[test]
    fn short_words_ignored() {
        let s = LexicalScorer;
        // "by", "of" are below the length threshold
        assert_eq!(s.similarity("by of to", "by of to"), 0.0);
    }

    #[test]
    fn keyword_similarity_takes_best() {
        let s = LexicalScorer;
        let keywords = vec!["gameplay".to_string(), "deposits".to_string()];
        let score = s.keyword_similarity("total deposits yesterday", &keywords);
        assert!(score > 0.0);
        assert_eq!(s.keyword_similarity("unrelated words here", &keywords), 0.0);
    }

    #[test]
    fn scores_stay_normalized() {
        let s = LexicalScorer;
        let score = s.similarity("deposits deposits deposits", "deposits");
        assert!((0.0..=1.0).contains(&score));
    }
}
