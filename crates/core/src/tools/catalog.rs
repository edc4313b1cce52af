//! # Catalog Responses
//!
//! Normalises the four USGS response shapes into one [`ApiResult`]:
//!
//! | shape | endpoint | result |
//! |---|---|---|
//! | `FeatureCollection` | `/query` | `collection` or `empty` |
//! | single `Feature` | `/query?eventid=` | `single_event` |
//! | `{"count": N}` | `/count` | `count` |
//! | `{}` / HTTP 204 / anything else | either | `empty` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::Endpoint;

/// Shape of a single catalog retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Collection,
    SingleEvent,
    Count,
    Empty,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Collection => "collection",
            ResultType::SingleEvent => "single_event",
            ResultType::Count => "count",
            ResultType::Empty => "empty",
        }
    }
}

/// One seismic event as reported by USGS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeEvent {
    pub id: String,
    pub magnitude: Option<f64>,
    pub mag_type: Option<String>,
    pub place: Option<String>,
    /// Origin time, Unix milliseconds
    pub time_ms: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub significance: Option<i64>,
    pub tsunami: Option<bool>,
    pub alert: Option<String>,
    pub felt: Option<i64>,
    pub cdi: Option<f64>,
    pub mmi: Option<f64>,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl EarthquakeEvent {
    /// Origin time as ISO8601 UTC, `unknown` when absent.
    pub fn time_iso(&self) -> String {
        self.time_ms
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Parsed response of one catalog call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    pub result_type: ResultType,
    pub total_available: Option<u64>,
    pub returned: Option<u64>,
    pub count: Option<u64>,
    #[serde(default)]
    pub events: Vec<EarthquakeEvent>,
    /// URL echoed back in the collection metadata
    pub query_url: Option<String>,
    pub generated_ms: Option<i64>,
}

impl ApiResult {
    pub fn empty(total_available: u64) -> Self {
        Self {
            result_type: ResultType::Empty,
            total_available: Some(total_available),
            returned: Some(0),
            count: None,
            events: Vec::new(),
            query_url: None,
            generated_ms: None,
        }
    }

    pub fn counted(count: u64) -> Self {
        Self {
            result_type: ResultType::Count,
            total_available: None,
            returned: None,
            count: Some(count),
            events: Vec::new(),
            query_url: None,
            generated_ms: None,
        }
    }

    pub fn single(event: EarthquakeEvent) -> Self {
        Self {
            result_type: ResultType::SingleEvent,
            total_available: Some(1),
            returned: Some(1),
            count: None,
            events: vec![event],
            query_url: None,
            generated_ms: None,
        }
    }

    pub fn collection(total_available: u64, events: Vec<EarthquakeEvent>) -> Self {
        Self {
            result_type: ResultType::Collection,
            total_available: Some(total_available),
            returned: Some(events.len() as u64),
            count: None,
            events,
            query_url: None,
            generated_ms: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.result_type == ResultType::Empty
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_feature(feature: &Value) -> EarthquakeEvent {
    let empty = Value::Null;
    let props = feature.get("properties").unwrap_or(&empty);
    let coords: Vec<Option<f64>> = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .map(|c| c.iter().map(Value::as_f64).collect())
        .unwrap_or_default();
    let coord = |i: usize| coords.get(i).copied().flatten();

    EarthquakeEvent {
        id: str_field(feature, "id").unwrap_or_default(),
        magnitude: props.get("mag").and_then(Value::as_f64),
        mag_type: str_field(props, "magType"),
        place: str_field(props, "place"),
        time_ms: props.get("time").and_then(Value::as_i64),
        // GeoJSON order is [longitude, latitude, depth]
        longitude: coord(0),
        latitude: coord(1),
        depth_km: coord(2),
        status: str_field(props, "status"),
        event_type: str_field(props, "type"),
        significance: props.get("sig").and_then(Value::as_i64),
        tsunami: props
            .get("tsunami")
            .and_then(Value::as_i64)
            .map(|t| t != 0),
        alert: str_field(props, "alert"),
        felt: props.get("felt").and_then(Value::as_i64),
        cdi: props.get("cdi").and_then(Value::as_f64),
        mmi: props.get("mmi").and_then(Value::as_f64),
        url: str_field(props, "url"),
        title: str_field(props, "title"),
    }
}

/// Convert a decoded catalog body into an [`ApiResult`].
pub fn parse_response(raw: &Value, endpoint: Endpoint) -> ApiResult {
    let is_blank = match raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_blank {
        return ApiResult::empty(0);
    }

    if endpoint == Endpoint::Count {
        return match raw.get("count").and_then(Value::as_u64).or(raw.as_u64()) {
            Some(count) => ApiResult::counted(count),
            None => ApiResult::empty(0),
        };
    }

    match raw.get("type").and_then(Value::as_str) {
        Some("Feature") => ApiResult::single(parse_feature(raw)),
        Some("FeatureCollection") => {
            let metadata = raw.get("metadata");
            let total = metadata
                .and_then(|m| m.get("count"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let features = raw
                .get("features")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut result = if total == 0 || features.is_empty() {
                ApiResult::empty(total)
            } else {
                ApiResult::collection(total, features.iter().map(parse_feature).collect())
            };
            result.query_url = metadata.and_then(|m| str_field(m, "url"));
            result.generated_ms = metadata
                .and_then(|m| m.get("generated"))
                .and_then(Value::as_i64);
            result
        }
        _ => ApiResult::empty(0),
    }
}
