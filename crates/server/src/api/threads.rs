//! # Thread API
//!
//! Conversation threads, their turns, and a per-thread SSE feed of turn
//! snapshots. Only the snapshot with `is_final` set is authoritative.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{delete, get, post},
    Router,
};
use futures::stream::{self, Stream};
use seismo_core::orchestrator::{TurnOutcome, TurnSnapshot};
use seismo_core::state::{EnrichedResponse, EvaluationResult, ThreadView};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::{broadcast, mpsc};
use utoipa::ToSchema;

use super::{ApiError, ApiResponse};
use crate::SharedState;

pub fn thread_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_thread))
        .route("/:id", delete(delete_thread))
        .route("/:id/turns", post(post_turn))
        .route("/:id/state", get(get_state))
        .route("/:id/events", get(thread_events))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadCreated {
    pub thread_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TurnRequest {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TurnResponse {
    pub thread_id: String,
    pub turn_index: usize,
    /// build_execute_query, show_glossary or answer_question
    pub action: String,
    pub answer_text: String,
    #[schema(value_type = Object)]
    pub enriched_response: Option<EnrichedResponse>,
    #[schema(value_type = Object)]
    pub evaluation: Option<EvaluationResult>,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            thread_id: outcome.thread_id,
            turn_index: outcome.turn_index,
            action: outcome.action.to_string(),
            answer_text: outcome.answer_text,
            enriched_response: outcome.enriched_response,
            evaluation: outcome.evaluation,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadStateResponse {
    pub thread_id: String,
    pub turn_count: usize,
    pub action: Option<String>,
    /// Present only when the latest turn was a data turn
    #[schema(value_type = Object)]
    pub enriched_response: Option<EnrichedResponse>,
    pub answer_text: Option<String>,
}

impl From<ThreadView> for ThreadStateResponse {
    fn from(view: ThreadView) -> Self {
        Self {
            thread_id: view.thread_id,
            turn_count: view.turn_count,
            action: view.action.map(|a| a.to_string()),
            enriched_response: view.enriched_response,
            answer_text: view.answer_text,
        }
    }
}

/// Start a new conversation thread
#[utoipa::path(
    post,
    path = "/api/v1/threads",
    tag = "threads",
    responses(
        (status = 200, description = "Thread created", body = ThreadCreated)
    )
)]
pub async fn create_thread(State(state): State<SharedState>) -> Json<ThreadCreated> {
    let thread_id = state.coordinator.store().create_thread().await;
    tracing::info!(%thread_id, "Thread created");
    Json(ThreadCreated { thread_id })
}

/// Discard a thread and its history
#[utoipa::path(
    delete,
    path = "/api/v1/threads/{id}",
    tag = "threads",
    params(("id" = String, Path, description = "Thread id")),
    responses(
        (status = 200, description = "Thread removed", body = ApiResponse),
        (status = 404, description = "Unknown thread", body = ApiResponse)
    )
)]
pub async fn delete_thread(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    if !state.coordinator.store().remove_thread(&id).await {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("unknown thread: {}", id),
        ));
    }
    state.drop_stream(&id).await;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Thread {} removed", id),
    }))
}

/// Run one turn and return its final outcome
#[utoipa::path(
    post,
    path = "/api/v1/threads/{id}/turns",
    tag = "threads",
    params(("id" = String, Path, description = "Thread id")),
    request_body = TurnRequest,
    responses(
        (status = 200, description = "Turn completed", body = TurnResponse),
        (status = 400, description = "Empty message", body = ApiResponse),
        (status = 404, description = "Unknown thread", body = ApiResponse),
        (status = 422, description = "Unrecognised action classification", body = ApiResponse),
        (status = 502, description = "Earthquake catalog unreachable", body = ApiResponse),
        (status = 503, description = "Language model unavailable", body = ApiResponse)
    )
)]
pub async fn post_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "message is empty"));
    }
    state.coordinator.store().slot(&id).await?;

    // Relay snapshots to SSE subscribers. The relay ends when the turn drops its sender.
    let broadcaster = state.broadcaster(&id).await;
    let (tx, mut rx) = mpsc::channel::<TurnSnapshot>(16);
    let relay = tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let _ = broadcaster.send(snapshot);
        }
    });

    let outcome = state.coordinator.run_turn(&id, &req.message, Some(tx)).await;
    let _ = relay.await;

    Ok(Json(outcome?.into()))
}

/// Latest answer of a thread after the staleness rule
#[utoipa::path(
    get,
    path = "/api/v1/threads/{id}/state",
    tag = "threads",
    params(("id" = String, Path, description = "Thread id")),
    responses(
        (status = 200, description = "Thread state", body = ThreadStateResponse),
        (status = 404, description = "Unknown thread", body = ApiResponse)
    )
)]
pub async fn get_state(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadStateResponse>, ApiError> {
    let view = state.coordinator.store().view(&id).await?;
    Ok(Json(view.into()))
}

/// SSE feed of turn snapshots with heartbeat
pub async fn thread_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.coordinator.store().slot(&id).await?;
    let rx = state.broadcaster(&id).await.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            let next = tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;
            return match next {
                Ok(Ok(snapshot)) => {
                    let json = serde_json::to_string(&snapshot).unwrap_or_default();
                    Some((Ok(Event::default().event("snapshot").data(json)), rx))
                }
                // Intermediate snapshots are disposable; carry on with the newest
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::debug!(skipped, "SSE subscriber lagged");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => None,
                Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
            };
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
