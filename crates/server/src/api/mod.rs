//! # HTTP API
//!
//! Thread and turn endpoints live in [`threads`]; the small read-only
//! endpoints stay next to the router in `main.rs`.

pub mod threads;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use seismo_core::TurnError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Error body with the status it maps to.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        let status = match &err {
            TurnError::UnknownThread(_) => StatusCode::NOT_FOUND,
            TurnError::Classification(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TurnError::CapabilityUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TurnError::CatalogUnreachable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_errors_map_to_statuses() {
        let cases = [
            (TurnError::UnknownThread("t".into()), StatusCode::NOT_FOUND),
            (
                TurnError::Classification("tell_joke".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                TurnError::CatalogUnreachable("timeout".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TurnError::CapabilityUnavailable {
                    stage: "summariser",
                    reason: "rate limited".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
        }
    }
}
