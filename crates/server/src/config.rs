//! Persisted server configuration in `.seismo/config.json`.
//!
//! Every field is optional; whatever is set overrides the pipeline defaults.

use seismo_core::models::{LlmProvider, ModelStage};
use seismo_core::orchestrator::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use utoipa::ToSchema;

pub const SEISMO_DIR: &str = ".seismo";

fn config_path() -> PathBuf {
    PathBuf::from(SEISMO_DIR).join("config.json")
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timespan_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_radius_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<u32>,
    /// Archive completed turns to `.seismo/seismo.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<bool>,
    /// stage id -> provider id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_providers: HashMap<String, String>,
    /// stage id -> model name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_models: HashMap<String, String>,
}

impl PersistedConfig {
    pub async fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                }),
                Err(_) => Self::default(),
            }
        } else {
            Self::default()
        }
    }

    pub async fn save(&self) -> Result<(), std::io::Error> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, content).await
    }

    pub fn merge(&mut self, other: PersistedConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            global_provider,
            global_model,
            base_url,
            catalog_base_url,
            request_timeout_secs,
            history_window,
            default_timespan_days,
            default_min_magnitude,
            default_radius_km,
            default_limit,
            archive
        );
        self.per_stage_providers.extend(other.per_stage_providers);
        self.per_stage_models.extend(other.per_stage_models);
    }

    /// Overlay onto the pipeline defaults. Unknown provider or stage ids are skipped with a warning.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        let models = &mut config.models;

        if let Some(id) = &self.global_provider {
            match LlmProvider::from_id(id) {
                Some(provider) => models.global_provider = provider,
                None => tracing::warn!(provider = %id, "Unknown provider, keeping default"),
            }
        }
        models.global_model = self.global_model.clone();
        models.base_url = self.base_url.clone();

        for (stage_id, provider_id) in &self.per_stage_providers {
            match (ModelStage::from_id(stage_id), LlmProvider::from_id(provider_id)) {
                (Some(stage), Some(provider)) => {
                    models.per_stage_providers.insert(stage, provider);
                }
                _ => tracing::warn!(stage = %stage_id, provider = %provider_id, "Ignoring stage provider override"),
            }
        }
        for (stage_id, model) in &self.per_stage_models {
            match ModelStage::from_id(stage_id) {
                Some(stage) => {
                    models.per_stage_models.insert(stage, model.clone());
                }
                None => tracing::warn!(stage = %stage_id, "Ignoring stage model override"),
            }
        }

        if let Some(url) = &self.catalog_base_url {
            config.catalog_base_url = url.clone();
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(window) = self.history_window {
            config.history_window = window;
        }

        let defaults = &mut config.defaults;
        if let Some(days) = self.default_timespan_days {
            defaults.timespan_days = days;
        }
        if let Some(magnitude) = self.default_min_magnitude {
            defaults.min_magnitude = magnitude;
        }
        if let Some(radius) = self.default_radius_km {
            defaults.radius_km = radius;
        }
        if let Some(limit) = self.default_limit {
            defaults.limit = limit;
        }

        if self.archive.unwrap_or(false) {
            config.archive_path = Some(PathBuf::from(SEISMO_DIR).join("seismo.db"));
        }
        config
    }
}
