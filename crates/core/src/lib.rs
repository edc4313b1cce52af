//! # Seismo Core
//!
//! Answers natural-language earthquake questions from live USGS data.
//!
//! ## Architecture
//!
//! - `orchestrator/` - Turn coordinator, router, executor and stage machine
//! - `skills/` - Language-model stages (normaliser, summariser, evaluator)
//! - `tools/` - USGS catalog gateway, query model, glossary, evidence blocks
//! - `state/` - Records, threads, the turn state store and the SQLite archive
//! - `models` - LLM provider configuration per stage
//!
//! ## Usage
//!
//! ```rust,ignore
//! use seismo_core::orchestrator::{Coordinator, PipelineConfig};
//!
//! let coordinator = Coordinator::from_config(&PipelineConfig::default())?;
//! let thread = coordinator.store().create_thread().await;
//! let outcome = coordinator
//!     .run_turn(&thread, "How many M6+ earthquakes occurred globally this month?", None)
//!     .await?;
//! ```

pub mod error;
pub mod models;
pub mod orchestrator;
pub mod skills;
pub mod state;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GatewayError, TurnError};
