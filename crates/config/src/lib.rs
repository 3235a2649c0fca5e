//! Configuration loading, validation, and management for PromptForge.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`PROMPTFORGE_*`). Every knob has a serde default so an
//! empty file — or no file at all — yields a fully working pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub assembly: AssemblyConfig,

    #[serde(default)]
    pub templates: TemplateConfig,
}

/// Context Analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Per-request deadline for the whole pipeline, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Per-classifier-call timeout, in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_classifier_timeout_ms() -> u64 {
    1_500
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            classifier_timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

/// Metadata Retrieval Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum tables kept after merge (the `K` parameter).
    #[serde(default = "default_max_tables")]
    pub max_tables: usize,

    /// Maximum columns kept per table.
    #[serde(default = "default_max_columns")]
    pub max_columns_per_table: usize,

    /// Strategy merge weights. Must sum to 1.0.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default = "default_domain_weight")]
    pub domain_weight: f32,
    #[serde(default = "default_entity_weight")]
    pub entity_weight: f32,
    #[serde(default = "default_glossary_weight")]
    pub glossary_weight: f32,

    /// Retrieval cache TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Per-store-call timeout, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_max_tables() -> usize {
    5
}
fn default_max_columns() -> usize {
    8
}
fn default_semantic_weight() -> f32 {
    0.4
}
fn default_domain_weight() -> f32 {
    0.25
}
fn default_entity_weight() -> f32 {
    0.2
}
fn default_glossary_weight() -> f32 {
    0.15
}
fn default_cache_ttl_secs() -> u64 {
    3_600
}
fn default_store_timeout_ms() -> u64 {
    2_000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tables: default_max_tables(),
            max_columns_per_table: default_max_columns(),
            semantic_weight: default_semantic_weight(),
            domain_weight: default_domain_weight(),
            entity_weight: default_entity_weight(),
            glossary_weight: default_glossary_weight(),
            cache_ttl_secs: default_cache_ttl_secs(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// Context Assembly Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Default prompt size cap when the caller passes none.
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,

    /// Tokens reserved for the model's response.
    #[serde(default = "default_reserved_response_tokens")]
    pub reserved_response_tokens: usize,

    /// Budgets at or below this use the exact DP optimizer; larger budgets
    /// fall back to greedy selection.
    #[serde(default = "default_dp_budget_threshold")]
    pub dp_budget_threshold: usize,
}

fn default_max_prompt_tokens() -> usize {
    4_096
}
fn default_reserved_response_tokens() -> usize {
    1_024
}
fn default_dp_budget_threshold() -> usize {
    8_192
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_prompt_tokens: default_max_prompt_tokens(),
            reserved_response_tokens: default_reserved_response_tokens(),
            dp_budget_threshold: default_dp_budget_threshold(),
        }
    }
}

/// Template Selector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Minimum score a static template must reach; below it a dynamic
    /// template is synthesized instead.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f32,

    /// Maximum worked examples appended to a prompt.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

fn default_quality_threshold() -> f32 {
    0.8
}
fn default_max_examples() -> usize {
    3
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            max_examples: default_max_examples(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a specific file path, apply environment
    /// overrides, and validate.
    ///
    /// A missing file yields defaults — this is the normal embedded case.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variable overrides (highest priority).
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("PROMPTFORGE_MAX_TABLES") {
            self.retrieval.max_tables = v;
        }
        if let Some(v) = env_parse("PROMPTFORGE_MAX_PROMPT_TOKENS") {
            self.assembly.max_prompt_tokens = v;
        }
        if let Some(v) = env_parse("PROMPTFORGE_CACHE_TTL_SECS") {
            self.retrieval.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("PROMPTFORGE_REQUEST_TIMEOUT_MS") {
            self.analyzer.request_timeout_ms = v;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weight_sum = self.retrieval.semantic_weight
            + self.retrieval.domain_weight
            + self.retrieval.entity_weight
            + self.retrieval.glossary_weight;
        if (weight_sum - 1.0).abs() > 0.001 {
            return Err(ConfigError::ValidationError(format!(
                "retrieval strategy weights must sum to 1.0, got {weight_sum}"
            )));
        }

        if self.retrieval.max_tables == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_tables must be at least 1".into(),
            ));
        }

        if self.assembly.max_prompt_tokens <= self.assembly.reserved_response_tokens {
            return Err(ConfigError::ValidationError(
                "assembly.max_prompt_tokens must exceed reserved_response_tokens".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.templates.quality_threshold) {
            return Err(ConfigError::ValidationError(
                "templates.quality_threshold must be within [0, 1]".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
