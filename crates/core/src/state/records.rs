//! # Turn Records
//!
//! Contracts produced by one turn of the pipeline: the classified [`Action`],
//! the [`ParsedIntent`], one [`ApiCallLog`] per catalog call, the
//! [`EvaluationResult`] and the caller-facing [`EnrichedResponse`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TurnError;
use crate::tools::{EarthquakeQuery, ResultType, Retrieval};

/// How a turn must be handled. Closed set; unknown tags are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Needs live data: executor, summariser and evaluator run
    BuildExecuteQuery,
    /// Definitional, answered from the glossary
    ShowGlossary,
    /// Conversational, answered directly
    AnswerQuestion,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::BuildExecuteQuery => "build_execute_query",
            Action::ShowGlossary => "show_glossary",
            Action::AnswerQuestion => "answer_question",
        }
    }

    pub fn requires_data(&self) -> bool {
        matches!(self, Action::BuildExecuteQuery)
    }
}

impl FromStr for Action {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "build_execute_query" => Ok(Action::BuildExecuteQuery),
            "show_glossary" => Ok(Action::ShowGlossary),
            "answer_question" => Ok(Action::AnswerQuestion),
            other => Err(TurnError::Classification(other.to_string())),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user wants done with the matching events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    List,
    Count,
    Extremum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::List => "list",
            Aggregation::Count => "count",
            Aggregation::Extremum => "extremum",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Some(Aggregation::List),
            "count" => Some(Aggregation::Count),
            "extremum" => Some(Aggregation::Extremum),
            _ => None,
        }
    }
}

/// One catalog query, labelled with its region when comparing regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTarget {
    pub label: Option<String>,
    pub query: EarthquakeQuery,
}

/// Structured reading of the latest user message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    /// Self-contained restatement, resolved against earlier turns
    pub restatement: String,
    /// Place or region as the user phrased it
    pub region: Option<String>,
    pub aggregation: Aggregation,
    /// Resolved queries; one per compared region
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
    /// Query fields the user stated explicitly
    #[serde(default)]
    pub explicit_fields: Vec<String>,
}

impl ParsedIntent {
    /// Conversational turns carry only the restatement.
    pub fn restated(restatement: impl Into<String>) -> Self {
        Self {
            restatement: restatement.into(),
            ..Default::default()
        }
    }

    fn primary(&self) -> Option<&EarthquakeQuery> {
        self.targets.first().map(|t| &t.query)
    }

    pub fn time_range(&self) -> (Option<&str>, Option<&str>) {
        match self.primary() {
            Some(q) => (q.starttime.as_deref(), q.endtime.as_deref()),
            None => (None, None),
        }
    }

    pub fn magnitude_filter(&self) -> (Option<f64>, Option<f64>) {
        match self.primary() {
            Some(q) => (q.minmagnitude, q.maxmagnitude),
            None => (None, None),
        }
    }
}

/// Record of one catalog call.
///
/// Which of `total_available`, `returned` and `count` are set depends only on
/// `result_type`; the rest serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallLog {
    pub url: String,
    pub retrieved_at_utc: String,
    pub result_type: ResultType,
    pub total_available: Option<u64>,
    pub returned: Option<u64>,
    pub count: Option<u64>,
}

fn iso(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl ApiCallLog {
    pub fn from_retrieval(retrieval: &Retrieval) -> Self {
        let result = &retrieval.result;
        let (total_available, returned, count) = match result.result_type {
            ResultType::Collection => (result.total_available, result.returned, None),
            ResultType::SingleEvent => (Some(1), Some(1), None),
            ResultType::Count => (None, None, result.count),
            ResultType::Empty => (Some(result.total_available.unwrap_or(0)), Some(0), None),
        };
        Self {
            url: retrieval.url.clone(),
            retrieved_at_utc: iso(&retrieval.retrieved_at),
            result_type: result.result_type,
            total_available,
            returned,
            count,
        }
    }

    /// Entry for a call that failed or was never sent.
    pub fn empty(url: impl Into<String>, at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            url: url.into(),
            retrieved_at_utc: iso(&at),
            result_type: ResultType::Empty,
            total_available: Some(0),
            returned: Some(0),
            count: None,
        }
    }

    /// Whether exactly the fields valid for `result_type` are populated.
    pub fn is_well_formed(&self) -> bool {
        let shape = (
            self.total_available.is_some(),
            self.returned.is_some(),
            self.count.is_some(),
        );
        let fields_ok = match self.result_type {
            ResultType::Collection | ResultType::SingleEvent | ResultType::Empty => {
                shape == (true, true, false)
            }
            ResultType::Count => shape == (false, false, true),
        };
        fields_ok && !self.url.is_empty() && !self.retrieved_at_utc.is_empty()
    }

    /// Numbers an answer may legitimately quote from this call.
    pub fn citable_numbers(&self) -> Vec<u64> {
        [self.total_available, self.returned, self.count]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Why an answer failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    MisalignedIntent,
    UngroundedOutput,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::MisalignedIntent => "misaligned_intent",
            FailureCategory::UngroundedOutput => "ungrounded_output",
        }
    }
}

/// Which verdict a rubric check contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Envelope completeness; affects the score only
    Structural,
    Grounding,
    Alignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCheck {
    pub name: String,
    pub kind: CheckKind,
    pub passed: bool,
    #[serde(default)]
    pub detail: String,
}

impl RubricCheck {
    pub fn new(name: &str, kind: CheckKind, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            passed,
            detail: detail.into(),
        }
    }
}

/// Evaluator verdict for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: u8,
    pub passed: bool,
    pub failure_category: Option<FailureCategory>,
    pub checks: Vec<RubricCheck>,
}

impl EvaluationResult {
    /// Combine rubric checks into a verdict.
    ///
    /// Passing needs every alignment and grounding check to pass. When both
    /// fail, alignment is reported.
    pub fn from_checks(checks: Vec<RubricCheck>) -> Self {
        let total = checks.len();
        let passed_count = checks.iter().filter(|c| c.passed).count();
        let score = if total == 0 {
            0
        } else {
            ((passed_count as f64 / total as f64) * 100.0).round() as u8
        };

        let holds = |kind: CheckKind| checks.iter().filter(|c| c.kind == kind).all(|c| c.passed);
        let aligned = holds(CheckKind::Alignment);
        let grounded = holds(CheckKind::Grounding);

        let failure_category = if !aligned {
            Some(FailureCategory::MisalignedIntent)
        } else if !grounded {
            Some(FailureCategory::UngroundedOutput)
        } else {
            None
        };

        Self {
            score,
            passed: failure_category.is_none(),
            failure_category,
            checks,
        }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &RubricCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Caller-facing bundle for a turn that ran the full data pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResponse {
    pub request_id: String,
    pub title: String,
    pub parsed_intent: String,
    pub assumptions: Vec<String>,
    pub api_calls: Vec<ApiCallLog>,
    pub answer_text: String,
    pub eval_score: u8,
    pub eval_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_failure_category: Option<FailureCategory>,
}

impl EnrichedResponse {
    pub fn apply_evaluation(&mut self, evaluation: &EvaluationResult) {
        self.eval_score = evaluation.score;
        self.eval_passed = evaluation.passed;
        self.eval_failure_category = evaluation.failure_category;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ApiResult;
    use chrono::{TimeZone, Utc};

    fn retrieval(result: ApiResult) -> Retrieval {
        Retrieval {
            url: "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson".into(),
            retrieved_at: Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0).unwrap(),
            result,
        }
    }

    #[test]
    fn test_unknown_action_is_a_classification_error() {
        assert_eq!(
            "show_glossary".parse::<Action>().unwrap(),
            Action::ShowGlossary
        );
        let err = "normalise_query".parse::<Action>().unwrap_err();
        assert!(matches!(err, TurnError::Classification(tag) if tag == "normalise_query"));
    }

    #[test]
    fn test_action_serialises_as_tag() {
        let json = serde_json::to_string(&Action::BuildExecuteQuery).unwrap();
        assert_eq!(json, "\"build_execute_query\"");
    }

    #[test]
    fn test_log_fields_follow_result_type() {
        let count = ApiCallLog::from_retrieval(&retrieval(ApiResult::counted(17)));
        assert_eq!(count.count, Some(17));
        assert!(count.total_available.is_none() && count.returned.is_none());
        assert!(count.is_well_formed());
        assert_eq!(count.retrieved_at_utc, "2026-10-17T08:30:00Z");

        let single = ApiCallLog::from_retrieval(&retrieval(ApiResult::single(Default::default())));
        assert_eq!((single.total_available, single.returned), (Some(1), Some(1)));
        assert!(single.is_well_formed());

        let empty = ApiCallLog::empty("https://x", Utc::now());
        assert!(empty.is_well_formed());
        assert_eq!(empty.citable_numbers(), vec![0, 0]);
    }

    #[test]
    fn test_log_serialises_nulls() {
        let log = ApiCallLog::from_retrieval(&retrieval(ApiResult::counted(3)));
        let value = serde_json::to_value(&log).unwrap();
        assert!(value["total_available"].is_null());
        assert!(value["returned"].is_null());
        assert_eq!(value["result_type"], "count");
    }

    #[test]
    fn test_alignment_failure_wins_tie() {
        let result = EvaluationResult::from_checks(vec![
            RubricCheck::new("title_present", CheckKind::Structural, true, ""),
            RubricCheck::new("claims_verified", CheckKind::Grounding, false, ""),
            RubricCheck::new("intent_aligned", CheckKind::Alignment, false, ""),
        ]);
        assert!(!result.passed);
        assert_eq!(result.score, 33);
        assert_eq!(result.failure_category, Some(FailureCategory::MisalignedIntent));
    }

    #[test]
    fn test_structural_miss_lowers_score_only() {
        let result = EvaluationResult::from_checks(vec![
            RubricCheck::new("title_present", CheckKind::Structural, false, ""),
            RubricCheck::new("claims_verified", CheckKind::Grounding, true, ""),
            RubricCheck::new("intent_aligned", CheckKind::Alignment, true, ""),
            RubricCheck::new("api_url_present", CheckKind::Structural, true, ""),
        ]);
        assert!(result.passed);
        assert_eq!(result.score, 75);
        assert!(result.failure_category.is_none());
    }

    #[test]
    fn test_passing_response_omits_failure_category() {
        let response = EnrichedResponse {
            request_id: "r".into(),
            title: "t".into(),
            parsed_intent: "p".into(),
            assumptions: vec![],
            api_calls: vec![],
            answer_text: "a".into(),
            eval_score: 100,
            eval_passed: true,
            eval_failure_category: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("eval_failure_category").is_none());
    }
}
