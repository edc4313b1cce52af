//! # Seismo Models
//!
//! LLM provider and model selection for the pipeline stages.
//!
//! Every stage that talks to a language model (classifier, normaliser,
//! summariser, evaluator) resolves its own [`ModelConfig`] through
//! [`StageModels::for_stage`], so a cheap model can classify while a stronger
//! one writes the grounded answer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported LLM providers
///
/// API keys are read from the environment by radkit:
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Parse the lowercase identifier used in config files and the CLI
    pub fn from_id(id: &str) -> Option<LlmProvider> {
        match id.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAI),
            "gemini" => Some(LlmProvider::Gemini),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }

    /// Model used when neither the stage nor the global config names one
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable holding the API key
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }
}

/// Provider + model for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Anthropic, LlmProvider::Anthropic.default_model())
    }
}

impl ModelConfig {
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Pipeline stages that call the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStage {
    Classifier,
    Normaliser,
    Summariser,
    Evaluator,
}

impl ModelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStage::Classifier => "classifier",
            ModelStage::Normaliser => "normaliser",
            ModelStage::Summariser => "summariser",
            ModelStage::Evaluator => "evaluator",
        }
    }

    pub fn from_id(id: &str) -> Option<ModelStage> {
        match id.trim().to_ascii_lowercase().as_str() {
            "classifier" => Some(ModelStage::Classifier),
            "normaliser" | "normalizer" => Some(ModelStage::Normaliser),
            "summariser" | "summarizer" => Some(ModelStage::Summariser),
            "evaluator" => Some(ModelStage::Evaluator),
            _ => None,
        }
    }
}

/// Global model selection with per-stage overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StageModels {
    #[serde(default)]
    pub global_provider: LlmProvider,
    pub global_model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub per_stage_providers: HashMap<ModelStage, LlmProvider>,
    #[serde(default)]
    pub per_stage_models: HashMap<ModelStage, String>,
}

impl StageModels {
    /// Resolve the model config for a stage: stage override -> global -> provider default.
    pub fn for_stage(&self, stage: ModelStage) -> ModelConfig {
        let provider = self
            .per_stage_providers
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        // A global model name only makes sense for the global provider.
        let model = self
            .per_stage_models
            .get(&stage)
            .cloned()
            .or_else(|| {
                if provider == self.global_provider {
                    self.global_model.clone()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.base_url.clone()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert!(config.model.contains("claude"));
    }

    #[test]
    fn test_provider_ids_round_trip() {
        for provider in LlmProvider::all() {
            let json = serde_json::to_string(&provider).unwrap();
            let id = json.trim_matches('"');
            assert_eq!(LlmProvider::from_id(id), Some(provider));
        }
        assert_eq!(LlmProvider::from_id("mystery"), None);
    }

    #[test]
    fn test_stage_override_wins() {
        let mut models = StageModels {
            global_provider: LlmProvider::OpenAI,
            global_model: Some("gpt-4o".to_string()),
            base_url: Some("http://localhost:11434/v1".to_string()),
            ..Default::default()
        };
        models
            .per_stage_models
            .insert(ModelStage::Classifier, "gpt-4o-mini".to_string());

        let classifier = models.for_stage(ModelStage::Classifier);
        assert_eq!(classifier.model, "gpt-4o-mini");
        assert_eq!(classifier.base_url.as_deref(), Some("http://localhost:11434/v1"));

        let summariser = models.for_stage(ModelStage::Summariser);
        assert_eq!(summariser.model, "gpt-4o");
    }

    #[test]
    fn test_stage_provider_switch_drops_foreign_model() {
        let mut models = StageModels {
            global_provider: LlmProvider::OpenAI,
            global_model: Some("gpt-4o".to_string()),
            base_url: Some("http://proxy".to_string()),
            ..Default::default()
        };
        models
            .per_stage_providers
            .insert(ModelStage::Evaluator, LlmProvider::Anthropic);

        let evaluator = models.for_stage(ModelStage::Evaluator);
        assert_eq!(evaluator.provider, LlmProvider::Anthropic);
        assert_eq!(evaluator.model, LlmProvider::Anthropic.default_model());
        assert!(evaluator.base_url.is_none());
    }

    #[test]
    fn test_stage_ids_accept_both_spellings() {
        assert_eq!(ModelStage::from_id("Summarizer"), Some(ModelStage::Summariser));
        assert_eq!(ModelStage::from_id("normaliser"), Some(ModelStage::Normaliser));
        assert_eq!(ModelStage::from_id("reviewer"), None);
    }
}
