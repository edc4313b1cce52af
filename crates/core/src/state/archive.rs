//! # Turn Archive
//!
//! Append-only audit log of completed turns. Each row stores the whole
//! [`Turn`] as JSON next to a few columns worth filtering on.

use anyhow::{Context, Result};
use rusqlite::params;
use std::sync::{Arc, Mutex};

use super::db::SeismoDb;
use super::thread::Turn;

pub struct TurnArchive {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl TurnArchive {
    pub fn new(db: &SeismoDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    pub fn record(&self, thread_id: &str, turn_index: usize, turn: &Turn) -> Result<()> {
        let payload = serde_json::to_string(turn).context("Failed to serialise turn")?;
        let enriched = turn.enriched_response.as_ref();

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO turns (thread_id, turn_index, action, request_id, eval_score, eval_passed, payload, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                thread_id,
                turn_index as i64,
                turn.action.as_str(),
                enriched.map(|e| e.request_id.clone()),
                enriched.map(|e| e.eval_score as i64),
                enriched.map(|e| e.eval_passed),
                payload,
                turn.completed_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to archive turn {} of {}", turn_index, thread_id))?;

        Ok(())
    }

    /// Archived turns of a thread in order.
    pub fn turns_for(&self, thread_id: &str) -> Result<Vec<Turn>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT payload FROM turns WHERE thread_id = ?1 ORDER BY turn_index")?;
        let payloads = stmt
            .query_map([thread_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).context("Corrupt archived turn"))
            .collect()
    }

    /// Count of archived data turns that failed evaluation.
    pub fn failed_evaluations(&self) -> Result<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE eval_passed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::records::{Action, EnrichedResponse, FailureCategory};
    use crate::state::thread::Message;
    use chrono::Utc;
    use tempfile::tempdir;

    fn turn(action: Action, enriched_response: Option<EnrichedResponse>) -> Turn {
        Turn {
            user_message: "How many?".into(),
            assistant_message: "Seven.".into(),
            action,
            enriched_response,
            messages: vec![Message::user("How many?"), Message::assistant("Seven.")],
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_archive_round_trips_turns_in_order() {
        let dir = tempdir().unwrap();
        let db = SeismoDb::open_at(dir.path().join("seismo.db")).unwrap();
        let archive = TurnArchive::new(&db);

        let failing = EnrichedResponse {
            request_id: "req-9".into(),
            title: "Count".into(),
            parsed_intent: "count".into(),
            assumptions: vec![],
            api_calls: vec![],
            answer_text: "Seven.".into(),
            eval_score: 40,
            eval_passed: false,
            eval_failure_category: Some(FailureCategory::UngroundedOutput),
        };

        archive
            .record("t1", 1, &turn(Action::AnswerQuestion, None))
            .unwrap();
        archive
            .record("t1", 0, &turn(Action::BuildExecuteQuery, Some(failing)))
            .unwrap();
        archive
            .record("t2", 0, &turn(Action::ShowGlossary, None))
            .unwrap();

        let turns = archive.turns_for("t1").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].action, Action::BuildExecuteQuery);
        assert_eq!(
            turns[0].enriched_response.as_ref().unwrap().request_id,
            "req-9"
        );
        assert_eq!(archive.failed_evaluations().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_turn_index_is_rejected() {
        let dir = tempdir().unwrap();
        let db = SeismoDb::open_at(dir.path().join("seismo.db")).unwrap();
        let archive = TurnArchive::new(&db);

        archive
            .record("t1", 0, &turn(Action::AnswerQuestion, None))
            .unwrap();
        assert!(archive
            .record("t1", 0, &turn(Action::AnswerQuestion, None))
            .is_err());
    }
}
