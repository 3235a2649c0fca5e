//! The construction pipeline orchestrator.
//!
//! `ConstructPrompt` runs Analyzer → Retrieval → Template Selector →
//! Assembly → Prompt Assembler, recording one trace step per stage. The
//! orchestrator is the single writer of the trace; concurrent sub-tasks
//! inside the stages return values and never touch it.
//!
//! The call never throws and never returns an empty result: callers get
//! either a usable prompt (possibly degraded, explicitly flagged) or a
//! structured failure naming the stage that could not complete — always
//! with the finalized trace.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use promptforge_analyzer::{Analysis, ContextAnalyzer};
use promptforge_assembly::{ContextAssemblyEngine, TokenBudget, build_sections};
use promptforge_config::PipelineConfig;
use promptforge_core::cache::{Cache, InMemoryTtlCache};
use promptforge_core::classifier::TextClassifier;
use promptforge_core::deadline::Deadline;
use promptforge_core::error::TerminalFailure;
use promptforge_core::metadata::{MetadataStore, RelationshipSource};
use promptforge_core::metrics::{MetricsSink, NoopMetricsSink};
use promptforge_core::profile::{BusinessContextProfile, DomainMatch, Intent};
use promptforge_core::schema::{ContextualSchema, DomainDescriptor, RetrievalOutcome};
use promptforge_core::scoring::{LexicalScorer, ScoringStrategy};
use promptforge_retrieval::MetadataRetrievalEngine;
use promptforge_templates::{
    PromptAssembler, TemplateChoice, TemplateRepository, TemplateSelector,
};
use promptforge_trace::{
    ConstructionTrace, InMemoryTraceStore, TraceRecorder, TraceStore, publish_trace,
};

use crate::options::ConstructOptions;

/// TTL for finished traces in the explain cache.
const TRACE_CACHE_TTL: Duration = Duration::from_secs(900);

/// A successfully constructed prompt.
#[derive(Debug, Clone)]
pub struct ConstructedPrompt {
    pub prompt_text: String,
    /// Exact recount of the final text.
    pub token_count: usize,
    /// Token cost of the selected sections alone.
    pub sections_tokens: usize,
    /// The section budget those tokens were held under.
    pub budget_tokens: usize,
    pub schema: ContextualSchema,
    /// Overall confidence (mean of step confidences).
    pub confidence: f32,
    /// True when any stage recovered through a fallback or partial data.
    pub degraded: bool,
}

/// How the request ended.
#[derive(Debug, Clone)]
pub enum ConstructionOutcome {
    Success(Box<ConstructedPrompt>),
    /// Zero relevant candidates from a healthy store — no prompt text.
    RetrievalEmpty,
    /// A terminal failure; the stage that could not complete is named.
    Failure {
        stage: &'static str,
        failure: TerminalFailure,
    },
}

/// The full result: outcome plus the finalized trace.
#[derive(Debug, Clone)]
pub struct Construction {
    pub outcome: ConstructionOutcome,
    pub trace: ConstructionTrace,
}

/// The request-scoped construction pipeline.
pub struct PromptConstructor {
    analyzer: ContextAnalyzer,
    retrieval: MetadataRetrievalEngine,
    assembly: ContextAssemblyEngine,
    selector: TemplateSelector,
    assembler: PromptAssembler,
    repository: Arc<TemplateRepository>,
    schema_cache: Arc<dyn Cache<ContextualSchema>>,
    trace_store: Arc<dyn TraceStore>,
    trace_cache: Arc<dyn Cache<ConstructionTrace>>,
    metrics: Arc<dyn MetricsSink>,
    config: PipelineConfig,
}

impl PromptConstructor {
    /// Wire the pipeline from its collaborators. Optional collaborators
    /// (scorer, caches, trace store, metrics sink, template repository)
    /// start at sensible in-memory defaults; use the `with_*` builders to
    /// replace them.
    pub fn new(
        classifier: Arc<dyn TextClassifier>,
        metadata_store: Arc<dyn MetadataStore>,
        relationships: Arc<dyn RelationshipSource>,
        domains: Vec<DomainDescriptor>,
        config: PipelineConfig,
    ) -> Self {
        let scorer: Arc<dyn ScoringStrategy> = Arc::new(LexicalScorer);
        Self::with_scorer(classifier, metadata_store, relationships, domains, config, scorer)
    }

    /// As `new`, with a custom scoring strategy shared by every stage.
    pub fn with_scorer(
        classifier: Arc<dyn TextClassifier>,
        metadata_store: Arc<dyn MetadataStore>,
        relationships: Arc<dyn RelationshipSource>,
        domains: Vec<DomainDescriptor>,
        config: PipelineConfig,
        scorer: Arc<dyn ScoringStrategy>,
    ) -> Self {
        let analyzer = ContextAnalyzer::new(classifier, scorer.clone(), domains.clone())
            .with_classifier_timeout(Duration::from_millis(config.analyzer.classifier_timeout_ms));
        let schema_cache: Arc<dyn Cache<ContextualSchema>> = Arc::new(InMemoryTtlCache::new());
        let retrieval = MetadataRetrievalEngine::new(
            metadata_store,
            relationships,
            scorer.clone(),
            schema_cache.clone(),
            domains,
            config.retrieval.clone(),
        );
        let assembly = ContextAssemblyEngine::new(config.assembly.dp_budget_threshold);
        let selector = TemplateSelector::new(config.templates.quality_threshold);
        let assembler = PromptAssembler::new(scorer, config.templates.max_examples);

        Self {
            analyzer,
            retrieval,
            assembly,
            selector,
            assembler,
            repository: Arc::new(TemplateRepository::with_defaults()),
            schema_cache,
            trace_store: Arc::new(InMemoryTraceStore::new()),
            trace_cache: Arc::new(InMemoryTtlCache::new()),
            metrics: Arc::new(NoopMetricsSink),
            config,
        }
    }

    pub fn with_repository(mut self, repository: Arc<TemplateRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_trace_store(mut self, store: Arc<dyn TraceStore>) -> Self {
        self.trace_store = store;
        self
    }

    pub fn with_trace_cache(mut self, cache: Arc<dyn Cache<ConstructionTrace>>) -> Self {
        self.trace_cache = cache;
        self
    }

    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// The retrieval cache, for wiring a schema-change invalidator
    /// (`promptforge_retrieval::spawn_invalidator`).
    pub fn schema_cache(&self) -> Arc<dyn Cache<ContextualSchema>> {
        self.schema_cache.clone()
    }

    /// The trace cache, for wiring an explainer over this constructor.
    pub fn trace_cache(&self) -> Arc<dyn Cache<ConstructionTrace>> {
        self.trace_cache.clone()
    }

    /// The trace store, for wiring an explainer over this constructor.
    pub fn trace_store(&self) -> Arc<dyn TraceStore> {
        self.trace_store.clone()
    }

    /// Construct a prompt for a question. Never throws; always returns a
    /// finalized trace.
    pub async fn construct(
        &self,
        question: &str,
        user_id: Option<&str>,
        options: &ConstructOptions,
    ) -> Construction {
        let timeout = Duration::from_millis(
            options
                .timeout_ms
                .unwrap_or(self.config.analyzer.request_timeout_ms),
        );
        let deadline = Deadline::after(timeout);
        let mut recorder = TraceRecorder::new(question, user_id.map(str::to_string));

        // ── Stage 1: analyze ──
        let guard = recorder.begin("analyze_context");
        let analysis = match self.analyzer.analyze(question, user_id, deadline).await {
            Ok(analysis) => analysis,
            // An unanalyzable question degrades like any classifier
            // failure: a minimal low-confidence profile, never an error.
            Err(e) => {
                warn!(error = %e, "analysis degraded to minimal profile");
                minimal_profile(question, user_id)
            }
        };
        let profile = analysis.profile;
        recorder
            .metrics()
            .classifier_fallbacks
            .fetch_add(analysis.fallbacks as u64, Ordering::Relaxed);
        recorder.complete(
            guard,
            profile.confidence,
            json!({
                "intent": profile.intent.kind.to_string(),
                "domain": profile.domain.name,
                "entities": profile.entities.len(),
                "time_range": profile.time_range.as_ref().map(|r| r.expression.clone()),
                "degraded": profile.degraded,
            }),
        );

        // ── Stage 2: retrieve ──
        let guard = recorder.begin("retrieve_metadata");
        let retrieval = self
            .retrieval
            .retrieve(&profile, options.max_tables, deadline)
            .await;
        let metrics = recorder.metrics();
        if retrieval.cache_hit {
            metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
        metrics
            .store_timeouts
            .fetch_add(retrieval.timeouts as u64, Ordering::Relaxed);

        let schema = retrieval.schema;
        let retrieval_detail = json!({
            "tables": schema.tables.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
            "outcome": schema.outcome,
            "cache_hit": retrieval.cache_hit,
            "timeouts": retrieval.timeouts,
        });
        if schema.outcome == RetrievalOutcome::Empty {
            recorder.fail(guard, 0.0, retrieval_detail, "no relevant metadata found");
            return self
                .finish(recorder, ConstructionOutcome::RetrievalEmpty)
                .await;
        }
        recorder.complete(guard, schema.relevance, retrieval_detail);

        // ── Stage 3: select template ──
        let guard = recorder.begin("select_template");
        let prefs = options.selection_preferences();
        let choice: TemplateChoice =
            match self.selector.select(&self.repository, &profile, &prefs) {
                Ok(choice) => {
                    recorder.complete(
                        guard,
                        choice.score,
                        json!({
                            "template": choice.template.id,
                            "origin": choice.template.origin,
                            "overhead_tokens": choice.template.overhead_tokens,
                        }),
                    );
                    choice
                }
                Err(failure) => {
                    recorder.fail(guard, 0.0, serde_json::Value::Null, failure.to_string());
                    return self
                        .finish(
                            recorder,
                            ConstructionOutcome::Failure {
                                stage: "select_template",
                                failure,
                            },
                        )
                        .await;
                }
            };

        // ── Stage 4: assemble ──
        let guard = recorder.begin("assemble_context");
        let candidates = build_sections(&profile, &schema);
        recorder
            .metrics()
            .sections_considered
            .fetch_add(candidates.len() as u64, Ordering::Relaxed);
        let budget = TokenBudget {
            max_prompt_tokens: options
                .max_prompt_tokens
                .unwrap_or(self.config.assembly.max_prompt_tokens),
            template_overhead: choice.template.overhead_tokens,
            reserved_response_tokens: options
                .reserved_response_tokens
                .unwrap_or(self.config.assembly.reserved_response_tokens),
        };
        let selection = match self.assembly.select(&candidates, &budget) {
            Ok(selection) => {
                recorder
                    .metrics()
                    .sections_selected
                    .fetch_add(selection.sections.len() as u64, Ordering::Relaxed);
                recorder.complete(
                    guard,
                    if selection.exact { 0.9 } else { 0.7 },
                    json!({
                        "considered": candidates.len(),
                        "selected": selection.sections.iter().map(|s| s.section.id.clone()).collect::<Vec<_>>(),
                        "compressed": selection.sections.iter().filter(|s| s.compressed).count(),
                        "total_tokens": selection.total_tokens,
                        "budget_tokens": selection.budget_tokens,
                        "utilization": selection.utilization,
                        "exact": selection.exact,
                    }),
                );
                selection
            }
            Err(failure) => {
                recorder.fail(
                    guard,
                    0.0,
                    json!({ "considered": candidates.len() }),
                    failure.to_string(),
                );
                return self
                    .finish(
                        recorder,
                        ConstructionOutcome::Failure {
                            stage: "assemble_context",
                            failure,
                        },
                    )
                    .await;
            }
        };

        // ── Stage 5: render ──
        let guard = recorder.begin("render_prompt");
        let rendered =
            self.assembler
                .render(&profile, &choice.template, &selection, self.repository.examples());
        recorder.complete(
            guard,
            1.0,
            json!({
                "token_count": rendered.token_count,
                "examples": rendered.examples.len(),
            }),
        );

        let degraded = profile.degraded || schema.outcome == RetrievalOutcome::Partial;
        let outcome = ConstructionOutcome::Success(Box::new(ConstructedPrompt {
            prompt_text: rendered.text,
            token_count: rendered.token_count,
            sections_tokens: selection.total_tokens,
            budget_tokens: selection.budget_tokens,
            schema,
            confidence: 0.0, // stamped from the finalized trace in finish()
            degraded,
        }));
        self.finish(recorder, outcome).await
    }

    /// Finalize the trace, publish it exactly once, merge metrics, and
    /// stamp the overall confidence into a successful outcome.
    async fn finish(&self, recorder: TraceRecorder, outcome: ConstructionOutcome) -> Construction {
        let (trace, metrics) = recorder.finish();
        publish_trace(&trace, &self.trace_store, &self.trace_cache, TRACE_CACHE_TTL).await;
        metrics.merge_into(self.metrics.as_ref());

        let outcome = match outcome {
            ConstructionOutcome::Success(mut prompt) => {
                prompt.confidence = trace.overall_confidence;
                info!(
                    trace_id = %trace.id,
                    tokens = prompt.token_count,
                    confidence = prompt.confidence,
                    degraded = prompt.degraded,
                    "prompt constructed"
                );
                ConstructionOutcome::Success(prompt)
            }
            other => {
                info!(trace_id = %trace.id, "construction ended without a prompt");
                other
            }
        };

        Construction { outcome, trace }
    }
}

/// The minimal profile used when even fallback analysis is impossible
/// (e.g. an empty question).
fn minimal_profile(question: &str, user_id: Option<&str>) -> Analysis {
    let intent = Intent::unknown();
    let domain = DomainMatch::uncategorized();
    let confidence = BusinessContextProfile::combine_confidence(&intent, &domain, &[]);
    Analysis {
        profile: BusinessContextProfile {
            question: question.to_string(),
            user_id: user_id.map(str::to_string),
            intent,
            domain,
            entities: Vec::new(),
            terms: Vec::new(),
            time_range: None,
            confidence,
            degraded: true,
        },
        fallbacks: 1,
    }
}
