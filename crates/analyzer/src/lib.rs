//! Context analysis — turns a raw business question into a structured
//! `BusinessContextProfile`.
//!
//! Four independent sub-analyses run concurrently and join at a barrier
//! before the profile is assembled — no caller ever observes a partial
//! profile:
//!
//! 1. **Intent classification** (external classifier, keyword fallback)
//! 2. **Domain detection** (descriptor registry, similarity scoring)
//! 3. **Entity extraction** (external classifier, lexicon fallback)
//! 4. **Time-range extraction** (absolute and relative expressions)
//!
//! A failing sub-analysis degrades its own contribution to a neutral,
//! low-confidence default; it never aborts the join. The profile is
//! returned with explicitly reduced confidence rather than an error.

pub mod domain;
pub mod entity;
pub mod intent;
pub mod time_range;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use promptforge_core::classifier::TextClassifier;
use promptforge_core::deadline::Deadline;
use promptforge_core::error::AnalysisError;
use promptforge_core::profile::{BusinessContextProfile, TermMatch};
use promptforge_core::schema::{DomainDescriptor, GlossaryTerm};
use promptforge_core::scoring::ScoringStrategy;

/// Minimum similarity for a vocabulary term to be attached to the profile.
const TERM_MATCH_FLOOR: f32 = 0.3;

/// Default cap on a single classifier call.
const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_millis(1_500);

/// The analysis result: the immutable profile plus how many sub-analyses
/// fell back to rule-based defaults (for request metrics).
#[derive(Debug, Clone)]
pub struct Analysis {
    pub profile: BusinessContextProfile,
    pub fallbacks: u32,
}

/// The Context Analyzer. Stateless across requests — create one and share.
pub struct ContextAnalyzer {
    classifier: Arc<dyn TextClassifier>,
    scorer: Arc<dyn ScoringStrategy>,
    domains: Vec<DomainDescriptor>,
    vocabulary: Vec<GlossaryTerm>,
    classifier_timeout: Duration,
}

impl ContextAnalyzer {
    pub fn new(
        classifier: Arc<dyn TextClassifier>,
        scorer: Arc<dyn ScoringStrategy>,
        domains: Vec<DomainDescriptor>,
    ) -> Self {
        Self {
            classifier,
            scorer,
            domains,
            vocabulary: Vec::new(),
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    /// Attach a business vocabulary matched into the profile's terms.
    pub fn with_vocabulary(mut self, vocabulary: Vec<GlossaryTerm>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Cap each classifier call below the request deadline.
    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    /// Analyze a question into a profile.
    ///
    /// Never fails for classifier reasons; the only error is an empty
    /// question, which the pipeline rejects before any stage runs.
    pub async fn analyze(
        &self,
        question: &str,
        user_id: Option<&str>,
        deadline: Deadline,
    ) -> Result<Analysis, AnalysisError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnalysisError::EmptyQuestion);
        }

        let now = Utc::now();
        // Classifier calls get the tighter of the per-call cap and what is
        // left of the request deadline.
        let call_deadline = Deadline::after(self.classifier_timeout.min(deadline.remaining()));
        let ((intent, intent_degraded), (domain, domain_degraded), (entities, entities_degraded), time_range) = tokio::join!(
            intent::classify_intent(self.classifier.as_ref(), question, call_deadline),
            async { domain::detect_domain(self.scorer.as_ref(), &self.domains, question) },
            entity::extract_entities(self.classifier.as_ref(), question, call_deadline),
            async { time_range::extract_time_range(question, now) },
        );

        let terms = self.match_terms(question);
        let confidence = BusinessContextProfile::combine_confidence(&intent, &domain, &entities);
        let fallbacks =
            u32::from(intent_degraded) + u32::from(domain_degraded) + u32::from(entities_degraded);
        let degraded = fallbacks > 0;

        if degraded {
            debug!(
                intent_degraded,
                domain_degraded, entities_degraded, "analysis degraded to fallbacks"
            );
        }
        info!(
            intent = %intent.kind,
            domain = %domain.name,
            entities = entities.len(),
            confidence,
            "context analyzed"
        );

        Ok(Analysis {
            profile: BusinessContextProfile {
                question: question.to_string(),
                user_id: user_id.map(str::to_string),
                intent,
                domain,
                entities,
                terms,
                time_range,
                confidence,
                degraded,
            },
            fallbacks,
        })
    }

    fn match_terms(&self, question: &str) -> Vec<TermMatch> {
        let mut terms: Vec<TermMatch> = self
            .vocabulary
            .iter()
            .filter_map(|t| {
                let score = self
                    .scorer
                    .similarity(question, &t.term)
                    .max(self.scorer.similarity(question, &t.definition));
                (score >= TERM_MATCH_FLOOR).then(|| TermMatch {
                    term: t.term.clone(),
                    definition: t.definition.clone(),
                    score,
                })
            })
            .collect();
        terms.sort_by(|a, b| b.score.total_cmp(&a.score));
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingClassifier, ScriptedClassifier};
    use promptforge_core::profile::IntentKind;
    use promptforge_core::scoring::LexicalScorer;
    use std::time::Duration;

    fn domains() -> Vec<DomainDescriptor> {
        vec![
            DomainDescriptor {
                name: "banking".into(),
                description: "Deposits, withdrawals, payments, account balances".into(),
                key_concepts: vec!["deposits".into(), "payments".into()],
                exclusive: false,
                excluded_intents: vec![],
            },
            DomainDescriptor {
                name: "gaming".into(),
                description: "Gameplay sessions, rounds, game catalog".into(),
                key_concepts: vec!["sessions".into(), "games".into()],
                exclusive: true,
                excluded_intents: vec![],
            },
        ]
    }

    fn analyzer_with_failing_classifier() -> ContextAnalyzer {
        ContextAnalyzer::new(
            Arc::new(FailingClassifier),
            Arc::new(LexicalScorer),
            domains(),
        )
    }

    #[tokio::test]
    async fn degraded_profile_still_complete() {
        let analyzer = analyzer_with_failing_classifier();
        let analysis = analyzer
            .analyze(
                "Total deposits by country last week",
                Some("u-1"),
                Deadline::after(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        let p = &analysis.profile;
        assert!(p.degraded);
        assert_eq!(analysis.fallbacks, 2); // intent + entities
        assert_eq!(p.intent.kind, IntentKind::Aggregation);
        assert_eq!(p.domain.name, "banking");
        assert!(!p.entities.is_empty());
        assert!(p.time_range.is_some());
        assert!(p.confidence > 0.0 && p.confidence < 0.7);
    }

    #[tokio::test]
    async fn healthy_classifier_yields_undegraded_profile() {
        let analyzer = ContextAnalyzer::new(
            Arc::new(ScriptedClassifier::healthy_for("Total deposits yesterday from UK")),
            Arc::new(LexicalScorer),
            domains(),
        );
        let analysis = analyzer
            .analyze(
                "Total deposits yesterday from UK",
                None,
                Deadline::after(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        assert!(!analysis.profile.degraded);
        assert_eq!(analysis.fallbacks, 0);
        assert_eq!(analysis.profile.intent.kind, IntentKind::Aggregation);
        assert!(analysis.profile.confidence > 0.5);
    }

    #[tokio::test]
    async fn empty_question_rejected() {
        let analyzer = analyzer_with_failing_classifier();
        let err = analyzer
            .analyze("   ", None, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyQuestion));
    }

    #[tokio::test]
    async fn vocabulary_terms_attached() {
        let analyzer = analyzer_with_failing_classifier().with_vocabulary(vec![GlossaryTerm {
            term: "deposits".into(),
            definition: "Incoming customer funds".into(),
            score: 0.0,
        }]);
        let analysis = analyzer
            .analyze(
                "total deposits yesterday",
                None,
                Deadline::after(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        assert_eq!(analysis.profile.terms.len(), 1);
        assert_eq!(analysis.profile.terms[0].term, "deposits");
    }
}
