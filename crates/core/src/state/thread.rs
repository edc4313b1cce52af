//! Conversation threads and their turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{Action, EnrichedResponse};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Pipeline progress notes; never an answer
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self {
            role: Role::Status,
            content: content.into(),
        }
    }
}

/// Latest assistant-authored text in a message sequence.
pub fn latest_assistant_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.as_str())
}

/// One completed exchange. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: String,
    pub assistant_message: String,
    pub action: Action,
    pub enriched_response: Option<EnrichedResponse>,
    /// Every message the turn produced, user message first
    pub messages: Vec<Message>,
    pub completed_at: DateTime<Utc>,
}

/// An ordered conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub turns: Vec<Turn>,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Flattened message history across all turns.
    pub fn messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|t| t.messages.iter().cloned())
            .collect()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, answer: &str) -> Turn {
        Turn {
            user_message: user.to_string(),
            assistant_message: answer.to_string(),
            action: Action::AnswerQuestion,
            enriched_response: None,
            messages: vec![
                Message::user(user),
                Message::status("Working"),
                Message::assistant(answer),
            ],
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_recent_window() {
        let mut thread = Thread::new("t1");
        for i in 0..5 {
            thread.push(turn(&format!("q{}", i), &format!("a{}", i)));
        }
        let recent = thread.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_message, "q3");
        assert_eq!(thread.recent(10).len(), 5);
    }

    #[test]
    fn test_status_notes_are_not_answers() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::status("Evaluating"),
        ];
        assert_eq!(latest_assistant_text(&messages), Some("hello"));
        assert_eq!(latest_assistant_text(&[Message::user("hi")]), None);
    }
}
