//! # Earthquake Data Gateway
//!
//! Deterministic tools around the USGS catalog. No language model in here:
//! what goes over the wire and what comes back is plain Rust.
//!
//! ## Modules
//!
//! - `query` - Typed FDSN query, validation and defaults
//! - `catalog` - Response shapes normalised into `ApiResult`
//! - `usgs` - `EarthquakeCatalog` trait and the reqwest-backed client
//! - `glossary` - Field reference for users and prompts
//! - `evidence` - Evidence blocks handed to the summariser and evaluator

pub mod catalog;
pub mod evidence;
pub mod glossary;
pub mod query;
pub mod usgs;

pub use catalog::{parse_response, ApiResult, EarthquakeEvent, ResultType};
pub use evidence::{evidence_block, evidence_digest, Evidence};
pub use glossary::{GlossaryEntry, GLOSSARY};
pub use query::{
    AlertLevel, EarthquakeQuery, Endpoint, OrderBy, QueryDefaults, ReviewStatus, ValidationReport,
};
pub use usgs::{EarthquakeCatalog, Retrieval, UsgsCatalog, USGS_BASE_URL};
