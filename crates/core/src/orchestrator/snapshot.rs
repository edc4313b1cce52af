//! Immutable per-stage views of a running turn.
//!
//! `enriched_response` only ever holds the bundle produced by the turn in
//! flight: empty until summarising, unscored until the final snapshot, and
//! always empty on non-data turns. Read answers through
//! [`TurnSnapshot::answer`]; only the final snapshot is authoritative.

use serde::{Deserialize, Serialize};

use super::pipeline::TurnStage;
use crate::state::{resolve_answer, Action, Answer, EnrichedResponse, Message};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub stage: TurnStage,
    pub action: Option<Action>,
    pub enriched_response: Option<EnrichedResponse>,
    /// Messages produced so far this turn, user message first
    pub messages: Vec<Message>,
    pub is_final: bool,
}

impl TurnSnapshot {
    /// The answer a caller may present, after the staleness rule.
    pub fn answer(&self) -> Answer<'_> {
        resolve_answer(self.action, self.enriched_response.as_ref(), &self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale_bundle() -> EnrichedResponse {
        EnrichedResponse {
            request_id: "old".into(),
            title: "12 earthquakes".into(),
            parsed_intent: "count".into(),
            assumptions: vec![],
            api_calls: vec![],
            answer_text: "There were 12 earthquakes.".into(),
            eval_score: 100,
            eval_passed: true,
            eval_failure_category: None,
        }
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = TurnSnapshot {
            stage: TurnStage::Complete,
            action: Some(Action::ShowGlossary),
            enriched_response: None,
            messages: vec![Message::user("What does magnitude mean?")],
            is_final: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["stage"], "complete");
        assert_eq!(json["action"], "show_glossary");
        assert!(json["enriched_response"].is_null());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_answer_ignores_leftover_bundle() {
        let snapshot = TurnSnapshot {
            stage: TurnStage::Complete,
            action: Some(Action::AnswerQuestion),
            enriched_response: Some(stale_bundle()),
            messages: vec![
                Message::user("thanks"),
                Message::assistant("You're welcome."),
            ],
            is_final: true,
        };
        let answer = snapshot.answer();
        assert!(answer.enriched_response.is_none());
        assert_eq!(answer.answer_text, Some("You're welcome."));
    }

    #[test]
    fn test_answer_uses_bundle_on_data_turn() {
        let snapshot = TurnSnapshot {
            stage: TurnStage::Complete,
            action: Some(Action::BuildExecuteQuery),
            enriched_response: Some(stale_bundle()),
            messages: vec![Message::user("how many?")],
            is_final: true,
        };
        assert_eq!(
            snapshot.answer().answer_text,
            Some("There were 12 earthquakes.")
        );
    }
}
