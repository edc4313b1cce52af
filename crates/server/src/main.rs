//! Seismo Server
//!
//! Axum server and command-line front end for the earthquake Q&A pipeline.
//! Every surface drives the same `Coordinator` from crates/core.

mod api;
mod config;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use seismo_core::models::LlmProvider;
use seismo_core::orchestrator::{Coordinator, PipelineConfig, TurnOutcome, TurnSnapshot};
use seismo_core::state::Role;
use seismo_core::tools::{glossary, GlossaryEntry, GLOSSARY};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::{collections::HashMap, net::SocketAddr, path::Path, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    sync::{broadcast, mpsc, RwLock},
};
use tracing_subscriber::EnvFilter;
use utoipa::{OpenApi, ToSchema};

use api::threads::{
    ThreadCreated, ThreadStateResponse, TurnRequest, TurnResponse,
};
use api::ApiResponse;
use config::{PersistedConfig, SEISMO_DIR};

#[derive(Parser, Clone)]
#[command(author, version, about = "Seismo - grounded answers about earthquakes from live USGS data")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Seismo server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Ask a single question (CLI mode, no server)
    Ask {
        question: String,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive conversation on one thread
    Chat,
}

/// Application state
pub struct AppState {
    pub coordinator: Coordinator,
    /// Snapshot feeds per thread
    streams: RwLock<HashMap<String, broadcast::Sender<TurnSnapshot>>>,
}

impl AppState {
    fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot feed for a thread, created on first use.
    pub async fn broadcaster(&self, thread_id: &str) -> broadcast::Sender<TurnSnapshot> {
        let mut streams = self.streams.write().await;
        streams
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    pub async fn drop_stream(&self, thread_id: &str) {
        self.streams.write().await.remove(thread_id);
    }
}

pub type SharedState = Arc<AppState>;

// === API Types ===

#[derive(Debug, Deserialize)]
struct GlossaryQuery {
    topic: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct GlossaryResponse {
    #[schema(value_type = Vec<Object>)]
    entries: Vec<&'static GlossaryEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigResponse {
    config: PersistedConfig,
    /// Pipeline configuration these overrides produce
    #[schema(value_type = Object)]
    effective: PipelineConfig,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProviderInfo {
    id: String,
    default_model: String,
    supports_base_url: bool,
    env_var: String,
    /// Whether the API key variable is set
    configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
}

fn provider_info(provider: &LlmProvider) -> ProviderInfo {
    let id = serde_json::to_value(provider)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    ProviderInfo {
        id,
        default_model: provider.default_model().to_string(),
        supports_base_url: provider.supports_base_url(),
        env_var: provider.env_var().to_string(),
        configured: std::env::var(provider.env_var()).is_ok(),
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Seismo API",
        version = "1.0.0",
        description = "Natural-language earthquake questions answered from the USGS catalog"
    ),
    paths(
        api::threads::create_thread,
        api::threads::delete_thread,
        api::threads::post_turn,
        api::threads::get_state,
        get_glossary,
        get_config,
        update_config,
        get_providers
    ),
    components(
        schemas(
            ApiResponse,
            ThreadCreated,
            TurnRequest,
            TurnResponse,
            ThreadStateResponse,
            GlossaryResponse,
            ConfigResponse,
            PersistedConfig,
            ProvidersResponse,
            ProviderInfo
        )
    ),
    tags(
        (name = "threads", description = "Conversation threads and turns"),
        (name = "glossary", description = "Query field reference"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
struct ApiDoc;

// === API Handlers ===

/// Query field glossary, optionally narrowed to a topic
#[utoipa::path(
    get,
    path = "/api/v1/glossary",
    tag = "glossary",
    params(("topic" = Option<String>, Query, description = "Term to look up")),
    responses(
        (status = 200, description = "Matching glossary entries", body = GlossaryResponse)
    )
)]
async fn get_glossary(Query(query): Query<GlossaryQuery>) -> Json<GlossaryResponse> {
    let entries = match query.topic.as_deref() {
        Some(topic) => glossary::lookup(topic),
        None => GLOSSARY.iter().collect(),
    };
    Json(GlossaryResponse { entries })
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Persisted overrides and the resulting pipeline config", body = ConfigResponse)
    )
)]
async fn get_config() -> Json<ConfigResponse> {
    let config = PersistedConfig::load().await;
    let effective = config.to_pipeline_config();
    Json(ConfigResponse { config, effective })
}

/// Update configuration (partial merge, applied on restart)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse)
    )
)]
async fn update_config(Json(updates): Json<PersistedConfig>) -> Json<ConfigResponse> {
    let mut config = PersistedConfig::load().await;
    config.merge(updates);

    if let Err(e) = config.save().await {
        tracing::error!("Failed to save config: {}", e);
    }

    let effective = config.to_pipeline_config();
    Json(ConfigResponse { config, effective })
}

/// Get available LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: LlmProvider::all().iter().map(provider_info).collect(),
    })
}

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], spec)
}

async fn health(State(state): State<SharedState>) -> Json<ApiResponse> {
    let threads = state.coordinator.store().thread_ids().await.len();
    Json(ApiResponse {
        success: true,
        message: format!("ok ({} active threads)", threads),
    })
}

// === Server Entry ===

pub async fn run_server(coordinator: Coordinator, host: &str, port: u16) -> anyhow::Result<()> {
    let state: SharedState = Arc::new(AppState::new(coordinator));

    let app = Router::new()
        .nest("/api/v1/threads", api::threads::thread_routes())
        .route("/api/v1/glossary", get(get_glossary))
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .route("/api/v1/health", get(health))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!(%addr, "Seismo server listening");
    println!("Seismo Server running at http://{}", addr);
    println!("   Threads:   POST /api/v1/threads, POST /api/v1/threads/:id/turns");
    println!("   State:     GET  /api/v1/threads/:id/state, /events (SSE)");
    println!("   Glossary:  GET  /api/v1/glossary?topic=");
    println!("   Config:    /api/v1/config (GET, PATCH)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// === CLI ===

fn print_outcome(outcome: &TurnOutcome) {
    let Some(response) = &outcome.enriched_response else {
        println!("{}", outcome.answer_text);
        return;
    };

    println!("## {}\n", response.title);
    println!("{}\n", response.answer_text);
    if !response.assumptions.is_empty() {
        println!("Assumptions:");
        for assumption in &response.assumptions {
            println!("  - {}", assumption);
        }
    }
    println!("Sources:");
    for call in &response.api_calls {
        println!("  - {} (retrieved {})", call.url, call.retrieved_at_utc);
    }
    let verdict = match response.eval_failure_category {
        Some(category) => format!("failed: {}", category.as_str()),
        None if response.eval_passed => "passed".to_string(),
        None => "failed".to_string(),
    };
    println!("Evaluation: {}/100, {}", response.eval_score, verdict);
    if let Some(evaluation) = &outcome.evaluation {
        for check in evaluation.failed_checks() {
            println!("  x {}: {}", check.name, check.detail);
        }
    }
}

async fn ask(coordinator: &Coordinator, question: &str, json: bool) -> anyhow::Result<()> {
    let thread = coordinator.store().create_thread().await;
    let outcome = coordinator.run_turn(&thread, question, None).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// Print each new progress note as snapshots arrive.
fn spawn_progress_printer(mut rx: mpsc::Receiver<TurnSnapshot>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut shown = 0;
        while let Some(snapshot) = rx.recv().await {
            let notes: Vec<&str> = snapshot
                .messages
                .iter()
                .filter(|m| m.role == Role::Status)
                .map(|m| m.content.as_str())
                .collect();
            for note in notes.iter().skip(shown) {
                eprintln!("  ... {}", note);
            }
            shown = shown.max(notes.len());
        }
    })
}

async fn chat(coordinator: &Coordinator) -> anyhow::Result<()> {
    let thread = coordinator.store().create_thread().await;
    println!("Ask about earthquakes. Type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let (tx, rx) = mpsc::channel(16);
        let printer = spawn_progress_printer(rx);
        let result = coordinator.run_turn(&thread, line, Some(tx)).await;
        let _ = printer.await;

        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("Turn failed: {}", e),
        }
        println!();
    }
    coordinator.store().remove_thread(&thread).await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("seismo_server=info,seismo_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Provider API keys from `.env` and `.seismo/.env`.
fn load_env() {
    let _ = dotenvy::dotenv();
    let local = Path::new(SEISMO_DIR).join(".env");
    if local.exists() {
        if let Err(e) = dotenvy::from_path(&local) {
            tracing::warn!("Failed to load {}: {}", local.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    load_env();
    let args = Args::parse();

    let config = PersistedConfig::load().await.to_pipeline_config();
    let coordinator = Coordinator::from_config(&config)?;

    match args.command {
        Some(CliCommand::Ask { question, json }) => ask(&coordinator, &question, json).await,
        Some(CliCommand::Chat) => chat(&coordinator).await,
        Some(CliCommand::Serve { port, host }) => run_server(coordinator, &host, port).await,
        None => run_server(coordinator, "127.0.0.1", 8080).await,
    }
}
