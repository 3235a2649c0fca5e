//! Shared scripted classifiers for analyzer tests.

use async_trait::async_trait;

use promptforge_core::classifier::{
    ClassificationRequest, ClassificationTask, Hypothesis, TextClassifier,
};
use promptforge_core::deadline::Deadline;
use promptforge_core::error::AnalysisError;
use promptforge_core::profile::EntityKind;

/// A classifier that returns scripted hypotheses per task.
pub struct ScriptedClassifier {
    intents: Vec<Hypothesis>,
    entities: Vec<Hypothesis>,
}

impl ScriptedClassifier {
    pub fn intents(intents: Vec<Hypothesis>) -> Self {
        Self {
            intents,
            entities: Vec::new(),
        }
    }

    pub fn entities(entities: Vec<Hypothesis>) -> Self {
        Self {
            intents: Vec::new(),
            entities,
        }
    }

    /// A classifier scripted to answer confidently for `question`:
    /// aggregation intent plus lexicon-derived entity spans.
    pub fn healthy_for(question: &str) -> Self {
        let entities = crate::entity::fallback_entities(question)
            .into_iter()
            .map(|e| Hypothesis {
                label: match e.kind {
                    EntityKind::Table => "table",
                    EntityKind::Column => "column",
                    EntityKind::Metric => "metric",
                    EntityKind::Dimension => "dimension",
                    EntityKind::TimeExpression => "time_expression",
                    EntityKind::Comparison => "comparison",
                }
                .to_string(),
                confidence: 0.85,
                span: Some((e.span.start, e.span.end)),
            })
            .collect();
        Self {
            intents: vec![Hypothesis {
                label: "aggregation".into(),
                confidence: 0.9,
                span: None,
            }],
            entities,
        }
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(
        &self,
        request: ClassificationRequest,
        _deadline: Deadline,
    ) -> Result<Vec<Hypothesis>, AnalysisError> {
        Ok(match request.task {
            ClassificationTask::Intent | ClassificationTask::Domain => self.intents.clone(),
            ClassificationTask::Entities => self.entities.clone(),
        })
    }
}

/// A classifier whose calls always fail — exercises every fallback path.
pub struct FailingClassifier;

#[async_trait]
impl TextClassifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn classify(
        &self,
        _request: ClassificationRequest,
        _deadline: Deadline,
    ) -> Result<Vec<Hypothesis>, AnalysisError> {
        Err(AnalysisError::ClassifierRejected("scripted failure".into()))
    }
}
