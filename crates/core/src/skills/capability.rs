//! # Language Model Capability
//!
//! The pipeline talks to the language model through [`LanguageModel`]: one
//! method per structured call, each stateless, all context passed in the
//! input text. [`RadkitModel`] is the production implementation.

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::prompts;
use crate::models::{ModelStage, StageModels};
use crate::run_llm_function;

/// Classifier decision for the newest user message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ClassifierOutput {
    /// One of "build_execute_query", "show_glossary", "answer_question"
    pub action: String,
    /// True when answering needs data from the catalog
    #[serde(default)]
    pub needs_live_data: bool,
    /// The request as one self-contained sentence
    pub restatement: String,
    /// Term asked about, for glossary requests
    #[serde(default)]
    pub topic: Option<String>,
    /// Text shown to the user
    #[serde(default)]
    pub reply: String,
}

/// Query fields as the model fills them. Enum-like values stay strings
/// until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct QueryFields {
    #[serde(default)]
    pub eventid: Option<String>,
    #[serde(default)]
    pub starttime: Option<String>,
    #[serde(default)]
    pub endtime: Option<String>,
    #[serde(default)]
    pub updatedafter: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub maxradiuskm: Option<f64>,
    #[serde(default)]
    pub minlatitude: Option<f64>,
    #[serde(default)]
    pub maxlatitude: Option<f64>,
    #[serde(default)]
    pub minlongitude: Option<f64>,
    #[serde(default)]
    pub maxlongitude: Option<f64>,
    #[serde(default)]
    pub minmagnitude: Option<f64>,
    #[serde(default)]
    pub maxmagnitude: Option<f64>,
    #[serde(default)]
    pub mindepth: Option<f64>,
    #[serde(default)]
    pub maxdepth: Option<f64>,
    #[serde(default)]
    pub eventtype: Option<String>,
    /// "reviewed" or "automatic"
    #[serde(default)]
    pub reviewstatus: Option<String>,
    /// "green", "yellow", "orange" or "red"
    #[serde(default)]
    pub alertlevel: Option<String>,
    #[serde(default)]
    pub producttype: Option<String>,
    #[serde(default)]
    pub minfelt: Option<u32>,
    #[serde(default)]
    pub minsig: Option<u32>,
    /// "time", "time-asc", "magnitude" or "magnitude-asc"
    #[serde(default)]
    pub orderby: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One side of a region comparison.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct RegionQuery {
    pub label: String,
    #[serde(rename = "fields")]
    pub query: QueryFields,
}

/// Extracted query for a data request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ExtractedQuery {
    /// "list", "count" or "extremum"
    pub aggregation: String,
    /// Place as the user phrased it
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "fields")]
    pub query: QueryFields,
    /// One entry per region when comparing regions
    #[serde(default)]
    pub comparisons: Vec<RegionQuery>,
    /// Inferences not stated by the user
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Grounded answer text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct SummaryOutput {
    pub title: String,
    /// Markdown answer
    pub answer_summary: String,
}

/// Model-judged alignment and grounding.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct Assessment {
    pub intent_aligned: bool,
    #[serde(default)]
    pub alignment_detail: String,
    pub claims_verified: bool,
    #[serde(default)]
    pub claims_detail: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn classify(&self, input: String) -> anyhow::Result<ClassifierOutput>;
    async fn extract(&self, input: String) -> anyhow::Result<ExtractedQuery>;
    async fn summarise(&self, input: String) -> anyhow::Result<SummaryOutput>;
    async fn assess(&self, input: String) -> anyhow::Result<Assessment>;
}

/// radkit-backed model with per-stage provider selection.
#[derive(Debug, Clone, Default)]
pub struct RadkitModel {
    models: StageModels,
}

impl RadkitModel {
    pub fn new(models: StageModels) -> Self {
        Self { models }
    }
}

#[async_trait]
impl LanguageModel for RadkitModel {
    async fn classify(&self, input: String) -> anyhow::Result<ClassifierOutput> {
        let config = self.models.for_stage(ModelStage::Classifier);
        tracing::debug!(provider = ?config.provider, model = %config.model, "classify");
        run_llm_function!(&config, ClassifierOutput, prompts::CLASSIFIER, input)
    }

    async fn extract(&self, input: String) -> anyhow::Result<ExtractedQuery> {
        let config = self.models.for_stage(ModelStage::Normaliser);
        tracing::debug!(provider = ?config.provider, model = %config.model, "extract");
        run_llm_function!(&config, ExtractedQuery, prompts::NORMALISER, input)
    }

    async fn summarise(&self, input: String) -> anyhow::Result<SummaryOutput> {
        let config = self.models.for_stage(ModelStage::Summariser);
        tracing::debug!(provider = ?config.provider, model = %config.model, "summarise");
        run_llm_function!(&config, SummaryOutput, prompts::SUMMARISER, input)
    }

    async fn assess(&self, input: String) -> anyhow::Result<Assessment> {
        let config = self.models.for_stage(ModelStage::Evaluator);
        tracing::debug!(provider = ?config.provider, model = %config.model, "assess");
        run_llm_function!(&config, Assessment, prompts::EVALUATOR, input)
    }
}
