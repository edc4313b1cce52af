//! # Turn Stages
//!
//! The stage machine a single turn walks through.

use serde::{Deserialize, Serialize};

use crate::state::Action;

/// Stage of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    /// Classifying the message and extracting query fields
    Normalising,
    /// Dispatching on the Action
    Routing,
    /// Calling the earthquake catalog
    Executing,
    /// Writing the grounded answer
    Summarising,
    /// Scoring the answer
    Evaluating,
    Complete,
    Failed,
}

/// The turn state machine
#[derive(Debug, Clone)]
pub struct TurnPipeline {
    pub stage: TurnStage,
    action: Option<Action>,
}

impl Default for TurnPipeline {
    fn default() -> Self {
        Self {
            stage: TurnStage::Normalising,
            action: None,
        }
    }
}

impl TurnPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the Action once normalising has produced it.
    pub fn route(&mut self, action: Action) {
        self.action = Some(action);
    }

    /// Advance to the next stage. Non-data turns skip straight from routing to completion.
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            TurnStage::Normalising => TurnStage::Routing,
            TurnStage::Routing => match self.action {
                Some(Action::BuildExecuteQuery) => TurnStage::Executing,
                Some(Action::ShowGlossary) | Some(Action::AnswerQuestion) => TurnStage::Complete,
                None => TurnStage::Failed,
            },
            TurnStage::Executing => TurnStage::Summarising,
            TurnStage::Summarising => TurnStage::Evaluating,
            TurnStage::Evaluating => TurnStage::Complete,
            TurnStage::Complete => TurnStage::Complete,
            TurnStage::Failed => TurnStage::Failed,
        };
    }

    pub fn fail(&mut self) {
        self.stage = TurnStage::Failed;
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.stage, TurnStage::Complete | TurnStage::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.stage == TurnStage::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_turn_walks_every_stage() {
        let mut pipeline = TurnPipeline::new();
        assert_eq!(pipeline.stage, TurnStage::Normalising);

        pipeline.advance();
        pipeline.route(Action::BuildExecuteQuery);
        assert_eq!(pipeline.stage, TurnStage::Routing);

        let mut seen = Vec::new();
        while !pipeline.is_complete() {
            pipeline.advance();
            seen.push(pipeline.stage);
        }
        assert_eq!(
            seen,
            vec![
                TurnStage::Executing,
                TurnStage::Summarising,
                TurnStage::Evaluating,
                TurnStage::Complete
            ]
        );
        assert!(pipeline.is_success());
    }

    #[test]
    fn test_glossary_turn_skips_data_stages() {
        let mut pipeline = TurnPipeline::new();
        pipeline.advance();
        pipeline.route(Action::ShowGlossary);
        pipeline.advance();
        assert_eq!(pipeline.stage, TurnStage::Complete);
    }

    #[test]
    fn test_routing_without_action_fails() {
        let mut pipeline = TurnPipeline::new();
        pipeline.advance();
        pipeline.advance();
        assert_eq!(pipeline.stage, TurnStage::Failed);
        assert!(pipeline.is_complete());
        assert!(!pipeline.is_success());
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut pipeline = TurnPipeline::new();
        pipeline.fail();
        pipeline.advance();
        assert_eq!(pipeline.stage, TurnStage::Failed);
    }
}
