pub mod archive;
pub mod db;
pub mod records;
pub mod store;
pub mod thread;

pub use archive::TurnArchive;
pub use db::SeismoDb;

pub use records::{
    Action, Aggregation, ApiCallLog, CheckKind, EnrichedResponse, EvaluationResult,
    FailureCategory, ParsedIntent, QueryTarget, RubricCheck,
};
pub use store::{resolve_answer, Answer, ThreadSlot, ThreadState, ThreadView, TurnStateStore};
pub use thread::{latest_assistant_text, Message, Role, Thread, Turn};
