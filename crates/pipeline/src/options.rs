//! Per-request construction options.

use serde::{Deserialize, Serialize};

use promptforge_templates::{SelectionPreferences, Verbosity};

/// Caller-supplied options for one `ConstructPrompt` call. `None` fields
/// fall back to the pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructOptions {
    /// Maximum candidate tables (the retrieval `K`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tables: Option<usize>,

    /// Maximum prompt tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prompt_tokens: Option<usize>,

    /// Tokens reserved for the model's response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_response_tokens: Option<usize>,

    #[serde(default)]
    pub verbosity: Verbosity,

    #[serde(default = "default_true")]
    pub include_rules: bool,

    #[serde(default = "default_true")]
    pub include_examples: bool,

    /// When false, a static template miss is terminal.
    #[serde(default = "default_true")]
    pub allow_synthesis: bool,

    /// Per-request deadline override, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ConstructOptions {
    pub(crate) fn selection_preferences(&self) -> SelectionPreferences {
        SelectionPreferences {
            verbosity: self.verbosity,
            include_rules: self.include_rules,
            include_examples: self.include_examples,
            allow_synthesis: self.allow_synthesis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_delegate_to_config() {
        let options: ConstructOptions = serde_json::from_str("{}").unwrap();
        assert!(options.max_tables.is_none());
        assert!(options.include_rules);
        assert!(options.include_examples);
        assert!(options.allow_synthesis);
    }

    #[test]
    fn preferences_carry_over() {
        let options = ConstructOptions {
            include_examples: false,
            verbosity: Verbosity::Minimal,
            ..Default::default()
        };
        let prefs = options.selection_preferences();
        assert!(!prefs.include_examples);
        assert_eq!(prefs.verbosity, Verbosity::Minimal);
    }
}
