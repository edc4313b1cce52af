//! Error types for the turn pipeline.
//!
//! Only failures that cannot be downgraded to an Assumption or an empty
//! retrieval surface here; everything else is absorbed by the stage that hit it.

use thiserror::Error;

/// Fatal failure of a single turn.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TurnError {
    /// The classifier produced an action tag outside the closed set.
    #[error("unrecognised action classification: {0}")]
    Classification(String),

    /// The language model could not be reached or returned unusable output.
    #[error("language model unavailable during {stage}: {reason}")]
    CapabilityUnavailable { stage: &'static str, reason: String },

    /// The earthquake catalog could not be reached at all.
    #[error("earthquake catalog unreachable: {0}")]
    CatalogUnreachable(String),

    #[error("unknown thread: {0}")]
    UnknownThread(String),
}

impl TurnError {
    pub(crate) fn capability(stage: &'static str, err: impl std::fmt::Display) -> Self {
        TurnError::CapabilityUnavailable {
            stage,
            reason: err.to_string(),
        }
    }
}

/// Failure of a single catalog call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Connection, DNS or timeout failure. Fatal to the turn.
    #[error("catalog unreachable: {0}")]
    Unreachable(String),

    /// The catalog answered with a non-success status.
    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The catalog answered but the body could not be decoded.
    #[error("could not decode catalog response: {0}")]
    Decode(String),

    /// The query failed validation and was never sent.
    #[error("{0}")]
    InvalidQuery(String),
}

impl GatewayError {
    /// Whether the failure can be recorded as an empty retrieval.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GatewayError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_fatal() {
        assert!(!GatewayError::Unreachable("timeout".into()).is_recoverable());
        assert!(GatewayError::Status {
            status: 400,
            body: "bad".into()
        }
        .is_recoverable());
        assert!(GatewayError::Decode("eof".into()).is_recoverable());
        assert!(GatewayError::InvalidQuery("x".into()).is_recoverable());
    }

    #[test]
    fn test_capability_message_names_stage() {
        let err = TurnError::capability("summariser", "rate limited");
        assert_eq!(
            err.to_string(),
            "language model unavailable during summariser: rate limited"
        );
    }
}
