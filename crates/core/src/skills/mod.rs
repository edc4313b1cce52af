//! # Seismo Skills
//!
//! The language-model stages of a turn.
//!
//! ```text
//! LanguageModel (trait)          RadkitModel: radkit LlmFunction per provider
//!   ├── NormaliserSkill          classify + extract -> Action, ParsedIntent
//!   ├── SummariserSkill          evidence -> title, answer
//!   └── EvaluatorSkill           rubric + assess -> EvaluationResult
//! ```

pub mod capability;
pub mod llm_helpers;
pub mod prompts;

pub mod evaluator_skill;
pub mod normaliser_skill;
pub mod summariser_skill;

pub use capability::{
    Assessment, ClassifierOutput, ExtractedQuery, LanguageModel, QueryFields, RadkitModel,
    RegionQuery, SummaryOutput,
};
pub use evaluator_skill::EvaluatorSkill;
pub use normaliser_skill::{Normalised, NormaliserSkill};
pub use summariser_skill::SummariserSkill;
