//! # Turn Orchestration
//!
//! ```text
//! user message → Normaliser → Router ─┬─ show_glossary / answer_question → reply
//!                                     └─ build_execute_query → Executor → Summariser → Evaluator
//! ```

pub mod coordinator;
pub mod executor;
pub mod pipeline;
pub mod router;
pub mod snapshot;

pub use coordinator::{Coordinator, PipelineConfig, TurnOutcome};
pub use executor::{Execution, QueryExecutor};
pub use pipeline::{TurnPipeline, TurnStage};
pub use router::{glossary_reply, route, Route};
pub use snapshot::TurnSnapshot;
