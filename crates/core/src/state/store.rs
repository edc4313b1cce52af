//! # Turn State Store
//!
//! Per-thread record of the latest pipeline outputs.
//!
//! The stored [`EnrichedResponse`] is only meaningful while the most recent
//! turn's action is `build_execute_query`. After a glossary or conversational
//! turn it is leftover from an earlier turn, and the answer is the latest
//! assistant message instead. [`resolve_answer`] is the one place that rule
//! lives; both [`ThreadState::view`] and snapshot consumers go through it.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::records::{Action, EnrichedResponse};
use super::thread::{latest_assistant_text, Message, Thread, Turn};
use crate::error::TurnError;

/// The answer a caller should present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Answer<'a> {
    pub enriched_response: Option<&'a EnrichedResponse>,
    pub answer_text: Option<&'a str>,
}

/// Apply the staleness rule to a final state.
pub fn resolve_answer<'a>(
    action: Option<Action>,
    enriched: Option<&'a EnrichedResponse>,
    messages: &'a [Message],
) -> Answer<'a> {
    match (action, enriched) {
        (Some(Action::BuildExecuteQuery), Some(enriched)) => Answer {
            enriched_response: Some(enriched),
            answer_text: Some(enriched.answer_text.as_str()),
        },
        _ => Answer {
            enriched_response: None,
            answer_text: latest_assistant_text(messages),
        },
    }
}

/// Caller-facing view of a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadView {
    pub thread_id: String,
    pub turn_count: usize,
    pub action: Option<Action>,
    pub enriched_response: Option<EnrichedResponse>,
    pub answer_text: Option<String>,
}

/// Contents of one thread slot.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub thread: Thread,
    last_action: Option<Action>,
    last_enriched: Option<EnrichedResponse>,
}

impl ThreadState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            thread: Thread::new(id),
            last_action: None,
            last_enriched: None,
        }
    }

    /// Append a completed turn. Only data turns replace the enriched slot.
    pub fn record(&mut self, turn: Turn) {
        self.last_action = Some(turn.action);
        if let Some(enriched) = &turn.enriched_response {
            self.last_enriched = Some(enriched.clone());
        }
        self.thread.push(turn);
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    /// Raw slot contents, possibly stale. Prefer [`ThreadState::view`].
    pub fn stored_enriched(&self) -> Option<&EnrichedResponse> {
        self.last_enriched.as_ref()
    }

    pub fn view(&self) -> ThreadView {
        let messages = self
            .thread
            .last_turn()
            .map(|t| t.messages.as_slice())
            .unwrap_or(&[]);
        let answer = resolve_answer(self.last_action, self.last_enriched.as_ref(), messages);
        ThreadView {
            thread_id: self.thread.id.clone(),
            turn_count: self.thread.turns.len(),
            action: self.last_action,
            enriched_response: answer.enriched_response.cloned(),
            answer_text: answer.answer_text.map(str::to_string),
        }
    }
}

pub type ThreadSlot = Arc<Mutex<ThreadState>>;

/// Thread-keyed slots. Each slot has its own mutex, held for a whole turn.
#[derive(Default)]
pub struct TurnStateStore {
    slots: RwLock<HashMap<String, ThreadSlot>>,
}

impl TurnStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a thread with a fresh id.
    pub async fn create_thread(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.open_thread(&id).await;
        id
    }

    /// Slot for `id`, created when missing.
    pub async fn open_thread(&self, id: &str) -> ThreadSlot {
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ThreadState::new(id)))),
        )
    }

    pub async fn slot(&self, id: &str) -> Result<ThreadSlot, TurnError> {
        self.slots
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TurnError::UnknownThread(id.to_string()))
    }

    /// Discard a thread at session end.
    pub async fn remove_thread(&self, id: &str) -> bool {
        self.slots.write().await.remove(id).is_some()
    }

    pub async fn view(&self, id: &str) -> Result<ThreadView, TurnError> {
        let slot = self.slot(id).await?;
        let state = slot.lock().await;
        Ok(state.view())
    }

    pub async fn thread_ids(&self) -> Vec<String> {
        self.slots.read().await.keys().cloned().collect()
    }
}
