//! # Turn Coordinator
//!
//! Runs one turn of a thread from user message to recorded answer.
//!
//! The thread's slot is locked for the whole turn, so turns on a thread never
//! overlap. A snapshot goes out after every stage. The store and archive are
//! written only once the turn completes; a failed or dropped turn leaves both
//! untouched.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::executor::{Execution, QueryExecutor};
use super::pipeline::TurnPipeline;
use super::router::{route, Route};
use super::snapshot::TurnSnapshot;
use crate::error::TurnError;
use crate::models::StageModels;
use crate::skills::summariser_skill::envelope;
use crate::skills::{
    EvaluatorSkill, LanguageModel, Normalised, NormaliserSkill, RadkitModel, SummariserSkill,
};
use crate::state::{
    Action, EnrichedResponse, EvaluationResult, Message, SeismoDb, ThreadState, Turn,
    TurnArchive, TurnStateStore,
};
use crate::tools::{EarthquakeCatalog, QueryDefaults, UsgsCatalog, USGS_BASE_URL};

/// Configuration for the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Provider and model per language-model stage
    pub models: StageModels,
    pub catalog_base_url: String,
    /// Timeout for a single catalog request
    pub request_timeout_secs: u64,
    /// Earlier turns shown to the classifier
    pub history_window: usize,
    pub defaults: QueryDefaults,
    /// SQLite file for the turn archive; no archive when unset
    pub archive_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: StageModels::default(),
            catalog_base_url: USGS_BASE_URL.to_string(),
            request_timeout_secs: crate::tools::usgs::DEFAULT_TIMEOUT_SECS,
            history_window: 6,
            defaults: QueryDefaults::default(),
            archive_path: None,
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub turn_index: usize,
    pub action: Action,
    pub answer_text: String,
    /// Present only for data turns
    pub enriched_response: Option<EnrichedResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationResult>,
}

/// Mutable state of the turn in flight. Snapshots are cut from it.
struct TurnRun {
    pipeline: TurnPipeline,
    action: Option<Action>,
    enriched: Option<EnrichedResponse>,
    messages: Vec<Message>,
    events: Option<mpsc::Sender<TurnSnapshot>>,
}

impl TurnRun {
    fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            stage: self.pipeline.stage,
            action: self.action,
            enriched_response: self.enriched.clone(),
            messages: self.messages.clone(),
            is_final: self.pipeline.is_complete(),
        }
    }

    async fn emit(&self) {
        if let Some(tx) = &self.events {
            let _ = tx.send(self.snapshot()).await;
        }
    }

    async fn advance(&mut self) {
        self.pipeline.advance();
        self.emit().await;
    }
}

/// Answer and evaluation of a finished turn, before it is recorded.
struct Finished {
    answer_text: String,
    enriched: Option<EnrichedResponse>,
    evaluation: Option<EvaluationResult>,
}

/// The turn coordinator
pub struct Coordinator {
    model: Arc<dyn LanguageModel>,
    catalog: Arc<dyn EarthquakeCatalog>,
    store: Arc<TurnStateStore>,
    archive: Option<TurnArchive>,
    defaults: QueryDefaults,
    history_window: usize,
}

impl Coordinator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        catalog: Arc<dyn EarthquakeCatalog>,
        store: Arc<TurnStateStore>,
    ) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            model,
            catalog,
            store,
            archive: None,
            defaults: defaults.defaults,
            history_window: defaults.history_window,
        }
    }

    /// Production wiring: radkit models, the USGS client and an optional archive.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let catalog = UsgsCatalog::new(
            config.catalog_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Failed to build catalog client")?;

        let mut coordinator = Self::new(
            Arc::new(RadkitModel::new(config.models.clone())),
            Arc::new(catalog),
            Arc::new(TurnStateStore::new()),
        )
        .with_defaults(config.defaults.clone())
        .with_history_window(config.history_window);

        if let Some(path) = &config.archive_path {
            let db = SeismoDb::open_at(path)
                .with_context(|| format!("Failed to open archive at {}", path.display()))?;
            coordinator = coordinator.with_archive(TurnArchive::new(&db));
        }
        Ok(coordinator)
    }

    pub fn with_archive(mut self, archive: TurnArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn store(&self) -> &Arc<TurnStateStore> {
        &self.store
    }

    pub fn archive(&self) -> Option<&TurnArchive> {
        self.archive.as_ref()
    }

    /// Run one turn on an existing thread.
    #[tracing::instrument(skip(self, text, events), fields(text_preview = %text.chars().take(50).collect::<String>()))]
    pub async fn run_turn(
        &self,
        thread_id: &str,
        text: &str,
        events: Option<mpsc::Sender<TurnSnapshot>>,
    ) -> Result<TurnOutcome, TurnError> {
        let slot = self.store.slot(thread_id).await?;
        let mut state = slot.lock().await;

        let mut run = TurnRun {
            pipeline: TurnPipeline::new(),
            action: None,
            enriched: None,
            messages: vec![Message::user(text)],
            events,
        };

        let finished = match self.drive(&state, text, &mut run).await {
            Ok(finished) => finished,
            Err(err) => {
                tracing::warn!(error = %err, stage = ?run.pipeline.stage, "Turn failed");
                run.pipeline.fail();
                run.enriched = None;
                run.emit().await;
                return Err(err);
            }
        };

        let action = run.action.unwrap_or(Action::AnswerQuestion);
        let turn = Turn {
            user_message: text.to_string(),
            assistant_message: finished.answer_text.clone(),
            action,
            enriched_response: finished.enriched.clone(),
            messages: run.messages.clone(),
            completed_at: Utc::now(),
        };
        let turn_index = state.thread.turns.len();

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.record(thread_id, turn_index, &turn) {
                tracing::warn!("Failed to archive turn: {}", e);
            }
        }
        state.record(turn);

        tracing::info!(%action, turn_index, "Turn complete");
        Ok(TurnOutcome {
            thread_id: thread_id.to_string(),
            turn_index,
            action,
            answer_text: finished.answer_text,
            enriched_response: finished.enriched,
            evaluation: finished.evaluation,
        })
    }

    async fn drive(
        &self,
        state: &ThreadState,
        text: &str,
        run: &mut TurnRun,
    ) -> Result<Finished, TurnError> {
        run.emit().await;

        let today = Utc::now().date_naive();
        let normalised = NormaliserSkill::new(self.model.as_ref(), &self.defaults, self.history_window)
            .run(text, &state.thread.turns, today)
            .await?;
        run.action = Some(normalised.action);
        run.pipeline.route(normalised.action);
        run.advance().await;

        match route(&normalised) {
            Route::Reply(reply) => {
                run.messages.push(Message::assistant(reply.clone()));
                run.advance().await;
                Ok(Finished {
                    answer_text: reply,
                    enriched: None,
                    evaluation: None,
                })
            }
            Route::Data => self.answer_with_data(normalised, run).await,
        }
    }

    async fn answer_with_data(
        &self,
        normalised: Normalised,
        run: &mut TurnRun,
    ) -> Result<Finished, TurnError> {
        let Normalised {
            intent,
            mut assumptions,
            ..
        } = normalised;

        run.messages.push(Message::status(format!(
            "Querying the USGS catalog ({} call{})",
            intent.targets.len(),
            if intent.targets.len() == 1 { "" } else { "s" }
        )));
        run.advance().await;

        let Execution {
            api_calls,
            evidence,
            assumptions: failures,
        } = QueryExecutor::new(self.catalog.as_ref()).run(&intent).await?;
        assumptions.extend(failures);
        run.messages.push(Message::status("Summarising the retrieved data"));
        run.advance().await;

        let summary = SummariserSkill::new(self.model.as_ref())
            .run(&intent, &assumptions, &evidence)
            .await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut response = envelope(request_id, &intent, assumptions, api_calls, summary);
        run.enriched = Some(response.clone());
        run.messages
            .push(Message::assistant(response.answer_text.clone()));
        run.advance().await;

        let evaluation = EvaluatorSkill::new(self.model.as_ref())
            .run(&intent, &response, &evidence)
            .await?;
        response.apply_evaluation(&evaluation);
        run.enriched = Some(response.clone());
        run.advance().await;

        Ok(Finished {
            answer_text: response.answer_text.clone(),
            enriched: Some(response),
            evaluation: Some(evaluation),
        })
    }
}
