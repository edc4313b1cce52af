//! # USGS Gateway
//!
//! HTTP client for the FDSN event service. Every call records where it went
//! and when, so answers can cite their source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::catalog::{parse_response, ApiResult};
use super::query::EarthquakeQuery;
use crate::error::GatewayError;

pub const USGS_BASE_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A completed catalog call with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    /// URL exactly as sent
    pub url: String,
    pub retrieved_at: DateTime<Utc>,
    pub result: ApiResult,
}

/// Source of earthquake data.
#[async_trait]
pub trait EarthquakeCatalog: Send + Sync {
    /// Base URL the catalog resolves queries against.
    fn base_url(&self) -> &str;

    async fn fetch(&self, query: &EarthquakeQuery) -> Result<Retrieval, GatewayError>;
}

/// Live USGS catalog.
pub struct UsgsCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl UsgsCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl Default for UsgsCatalog {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: USGS_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl EarthquakeCatalog for UsgsCatalog {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, query: &EarthquakeQuery) -> Result<Retrieval, GatewayError> {
        let report = query.validate();
        if !report.is_valid() {
            return Err(GatewayError::InvalidQuery(report.to_string()));
        }

        let url = query.url(&self.base_url);
        let retrieved_at = Utc::now();
        tracing::debug!(url = %url, "Fetching from USGS");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Retrieval {
                url,
                retrieved_at,
                result: ApiResult::empty(0),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?
        };

        Ok(Retrieval {
            url,
            retrieved_at,
            result: parse_response(&raw, query.endpoint),
        })
    }
}
