//! Evidence block rendering.
//!
//! The summariser and evaluator see retrieved data only through these blocks,
//! so every fact an answer may cite has to appear here.

use super::catalog::ResultType;
use super::usgs::Retrieval;

fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    v.as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render one retrieval. `label` names the region in comparison queries.
pub fn evidence_block(retrieval: &Retrieval, label: Option<&str>) -> String {
    let result = &retrieval.result;
    let mut lines = vec!["=== API EVIDENCE BLOCK ===".to_string()];
    if let Some(label) = label {
        lines.push(format!("Target: {}", label));
    }
    lines.push(format!(
        "Retrieved at: {} (UTC)",
        retrieval.retrieved_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    lines.push(format!("API URL: {}", retrieval.url));
    lines.push("Source: USGS preferred event data".to_string());
    lines.push(format!("Result type: {}", result.result_type.as_str()));

    match result.result_type {
        ResultType::Count => {
            lines.push(format!("Count: {}", opt(&result.count)));
        }
        ResultType::Empty => {
            lines.push("No events matched the query.".to_string());
            lines.push(format!(
                "Total available: {}",
                result.total_available.unwrap_or(0)
            ));
        }
        ResultType::Collection | ResultType::SingleEvent => {
            lines.push(format!(
                "Total matching in catalogue: {}",
                opt(&result.total_available)
            ));
            lines.push(format!(
                "Events returned in this response: {}",
                opt(&result.returned)
            ));
            lines.push(String::new());

            for (i, ev) in result.events.iter().enumerate() {
                lines.push(format!("--- Event {} ---", i + 1));
                lines.push(format!("  ID:         {}", ev.id));
                lines.push(format!(
                    "  Magnitude:  {} {}",
                    opt(&ev.magnitude),
                    ev.mag_type.as_deref().unwrap_or("")
                ));
                lines.push(format!(
                    "  Place:      {}",
                    ev.place.as_deref().unwrap_or("unknown")
                ));
                lines.push(format!("  Time (UTC): {}", ev.time_iso()));
                lines.push(format!("  Depth:      {} km", opt(&ev.depth_km)));
                lines.push(format!(
                    "  Location:   lat={}, lon={}",
                    opt(&ev.latitude),
                    opt(&ev.longitude)
                ));
                lines.push(format!(
                    "  Status:     {}",
                    ev.status.as_deref().unwrap_or("unknown")
                ));
                if let Some(alert) = &ev.alert {
                    lines.push(format!("  Alert:      {} (PAGER)", alert));
                }
                if ev.tsunami == Some(true) {
                    lines.push("  Tsunami:    YES".to_string());
                }
                if let Some(sig) = ev.significance {
                    lines.push(format!("  Significance: {}", sig));
                }
                if let Some(felt) = ev.felt {
                    lines.push(format!("  Felt reports: {}", felt));
                }
                if let Some(cdi) = ev.cdi {
                    lines.push(format!("  Max CDI:    {}", cdi));
                }
                if let Some(mmi) = ev.mmi {
                    lines.push(format!("  Max MMI:    {}", mmi));
                }
                if let Some(url) = &ev.url {
                    lines.push(format!("  URL:        {}", url));
                }
                lines.push(String::new());
            }
        }
    }

    lines.push("=== END EVIDENCE BLOCK ===".to_string());
    lines.join("\n")
}

/// A retrieval as the summariser and evaluator see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Region label for comparisons
    pub label: Option<String>,
    pub retrieval: Retrieval,
    /// Why the call produced no data, when it failed
    pub failure: Option<String>,
}

impl Evidence {
    pub fn block(&self) -> String {
        let block = evidence_block(&self.retrieval, self.label.as_deref());
        match &self.failure {
            Some(reason) => format!(
                "NOTE: this call failed and returned no data ({}).\n{}",
                reason, block
            ),
            None => block,
        }
    }
}

/// One-line digest used by the evaluator.
pub fn evidence_digest(retrieval: &Retrieval) -> String {
    let result = &retrieval.result;
    match result.result_type {
        ResultType::Count => format!("count={}", opt(&result.count)),
        ResultType::Empty => "empty (no events)".to_string(),
        ResultType::Collection | ResultType::SingleEvent => {
            let ids: Vec<String> = result
                .events
                .iter()
                .take(5)
                .map(|e| format!("{} (M{})", e.id, opt(&e.magnitude)))
                .collect();
            format!(
                "{}: total_available={}, returned={}, top events: {}",
                result.result_type.as_str(),
                opt(&result.total_available),
                opt(&result.returned),
                ids.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog::{ApiResult, EarthquakeEvent};
    use chrono::{TimeZone, Utc};

    fn retrieval(result: ApiResult) -> Retrieval {
        Retrieval {
            url: "https://earthquake.usgs.gov/fdsnws/event/1/count?format=geojson".into(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap(),
            result,
        }
    }

    #[test]
    fn test_count_block_carries_provenance() {
        let block = evidence_block(&retrieval(ApiResult::counted(14)), None);
        assert!(block.contains("Retrieved at: 2026-10-17T12:00:00Z (UTC)"));
        assert!(block.contains("API URL: https://earthquake.usgs.gov"));
        assert!(block.contains("Count: 14"));
        assert!(block.ends_with("=== END EVIDENCE BLOCK ==="));
    }

    #[test]
    fn test_collection_block_lists_events() {
        let event = EarthquakeEvent {
            id: "us7000abcd".into(),
            magnitude: Some(6.2),
            alert: Some("orange".into()),
            tsunami: Some(false),
            ..Default::default()
        };
        let block = evidence_block(&retrieval(ApiResult::collection(3, vec![event])), Some("Japan"));
        assert!(block.contains("Target: Japan"));
        assert!(block.contains("ID:         us7000abcd"));
        assert!(block.contains("Alert:      orange (PAGER)"));
        assert!(!block.contains("Tsunami"));
        assert!(block.contains("Total matching in catalogue: 3"));
    }

    #[test]
    fn test_failed_call_is_flagged() {
        let evidence = Evidence {
            label: None,
            retrieval: retrieval(ApiResult::empty(0)),
            failure: Some("catalog returned 400: bad request".into()),
        };
        let block = evidence.block();
        assert!(block.starts_with("NOTE: this call failed"));
        assert!(block.contains("No events matched the query."));
    }

    #[test]
    fn test_digest_for_empty() {
        assert_eq!(
            evidence_digest(&retrieval(ApiResult::empty(0))),
            "empty (no events)"
        );
    }
}
