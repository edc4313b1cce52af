//! # Evaluator Skill
//!
//! Scores a finished answer. Deterministic rubric checks cover the envelope
//! and the numbers an answer quotes; the model judges intent alignment and
//! claim accuracy. The verdict is observational: nothing is retried.
//!
//! | check | kind | when |
//! |---|---|---|
//! | `title_present` | structural | always |
//! | `retrieval_timestamp_present` | structural | always |
//! | `api_url_present` | structural | always |
//! | `assumptions_disclosed` | structural | assumptions were applied |
//! | `event_ids_referenced` | structural | events were returned |
//! | `failure_explained` | structural | every call came back empty |
//! | `count_value_in_answer` | grounding | per count result |
//! | `count_claims_traceable` | grounding | answer quotes "N earthquakes" |
//! | `claims_verified` | grounding | model |
//! | `intent_aligned` | alignment | model |

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::capability::LanguageModel;
use crate::error::TurnError;
use crate::state::{CheckKind, EnrichedResponse, EvaluationResult, ParsedIntent, RubricCheck};
use crate::tools::{evidence_digest, Evidence, ResultType};

/// Minimum answer length that counts as explaining an empty result.
const MIN_EXPLANATION_CHARS: usize = 80;

/// Answer text shown to the model is cut at this many characters.
const MAX_ANSWER_CHARS: usize = 2000;

pub struct EvaluatorSkill<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> EvaluatorSkill<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub async fn run(
        &self,
        intent: &ParsedIntent,
        response: &EnrichedResponse,
        evidence: &[Evidence],
    ) -> Result<EvaluationResult, TurnError> {
        let mut checks = rubric_checks(response, evidence);

        let assessment = self
            .model
            .assess(build_input(intent, response, evidence))
            .await
            .map_err(|e| TurnError::capability("evaluator", e))?;

        checks.push(RubricCheck::new(
            "intent_aligned",
            CheckKind::Alignment,
            assessment.intent_aligned,
            assessment.alignment_detail,
        ));
        checks.push(RubricCheck::new(
            "claims_verified",
            CheckKind::Grounding,
            assessment.claims_verified,
            assessment.claims_detail,
        ));

        let result = EvaluationResult::from_checks(checks);
        tracing::info!(
            request_id = %response.request_id,
            score = result.score,
            passed = result.passed,
            category = ?result.failure_category,
            "Evaluated answer"
        );
        Ok(result)
    }
}

fn count_claim_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(\d[\d,]*)\s+(?:[\w.+-]+\s+){0,2}?(?:earthquakes?|events?|quakes?|tremors?|shocks?)\b",
            )
            .ok()
        })
        .as_ref()
}

fn number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d[\d,]*").ok())
        .as_ref()
}

fn number_word_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(no|none|zero|a single|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)\b",
            )
            .ok()
        })
        .as_ref()
}

fn word_value(word: &str) -> Option<u64> {
    let value = match word.to_ascii_lowercase().as_str() {
        "no" | "none" | "zero" => 0,
        "a single" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        _ => return None,
    };
    Some(value)
}

fn parse_number(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

/// Every count written in `text`: digits with thousands separators, and
/// small counts spelled out ("no", "one" ... "twenty").
fn numbers_in(text: &str) -> BTreeSet<u64> {
    let mut numbers = BTreeSet::new();
    if let Some(pattern) = number_pattern() {
        numbers.extend(pattern.find_iter(text).filter_map(|m| parse_number(m.as_str())));
    }
    if let Some(pattern) = number_word_pattern() {
        numbers.extend(pattern.find_iter(text).filter_map(|m| word_value(m.as_str())));
    }
    numbers
}

fn word_before(text: &str, start: usize) -> String {
    text[..start]
        .trim_end()
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase()
}

/// Magnitudes ("magnitude 6 earthquakes", "M4.5 events") are not counts.
///
/// Only a '.' directly between digits marks a decimal; a sentence end does not.
fn is_magnitude_context(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    if before.next() == Some('.') && before.next().is_some_and(|c| c.is_ascii_digit()) {
        return true;
    }
    matches!(
        word_before(text, start).as_str(),
        "magnitude" | "mag" | "m" | "mw" | "ml"
    )
}

/// "since 2016 earthquakes ..." names a year, not a count.
fn is_year_context(text: &str, start: usize, value: u64) -> bool {
    (1900..=2100).contains(&value)
        && matches!(
            word_before(text, start).as_str(),
            "in" | "since" | "during" | "from" | "until" | "before" | "after" | "of"
        )
}

/// Counts the answer claims, e.g. "14 earthquakes" gives 14.
pub fn count_claims(text: &str) -> Vec<u64> {
    let Some(pattern) = count_claim_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps.get(1)?;
            if is_magnitude_context(text, number.start()) {
                return None;
            }
            let value = parse_number(number.as_str())?;
            if is_year_context(text, number.start(), value) {
                return None;
            }
            Some(value)
        })
        .collect()
}

/// Numbers an answer may cite: every logged figure, plus sums across calls.
fn citable_numbers(response: &EnrichedResponse) -> BTreeSet<u64> {
    let mut citable: BTreeSet<u64> = response
        .api_calls
        .iter()
        .flat_map(|log| log.citable_numbers())
        .collect();
    if response.api_calls.len() > 1 {
        let counts: u64 = response.api_calls.iter().filter_map(|l| l.count).sum();
        let totals: u64 = response
            .api_calls
            .iter()
            .filter_map(|l| l.total_available)
            .sum();
        citable.insert(counts);
        citable.insert(totals);
    }
    citable
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Deterministic part of the rubric.
pub fn rubric_checks(response: &EnrichedResponse, evidence: &[Evidence]) -> Vec<RubricCheck> {
    let mut checks = Vec::new();
    let answer = response.answer_text.as_str();

    let title = response.title.trim();
    checks.push(RubricCheck::new(
        "title_present",
        CheckKind::Structural,
        !title.is_empty(),
        if title.is_empty() {
            "title is empty".to_string()
        } else {
            truncate_chars(title, 80).to_string()
        },
    ));

    let logs = &response.api_calls;
    let stamped = !logs.is_empty() && logs.iter().all(|l| !l.retrieved_at_utc.is_empty());
    checks.push(RubricCheck::new(
        "retrieval_timestamp_present",
        CheckKind::Structural,
        stamped,
        logs.first()
            .map(|l| l.retrieved_at_utc.clone())
            .unwrap_or_else(|| "no api_calls recorded".to_string()),
    ));

    let with_url = !logs.is_empty() && logs.iter().all(|l| !l.url.is_empty());
    checks.push(RubricCheck::new(
        "api_url_present",
        CheckKind::Structural,
        with_url,
        logs.first()
            .map(|l| truncate_chars(&l.url, 80).to_string())
            .unwrap_or_else(|| "missing".to_string()),
    ));

    if !response.assumptions.is_empty() {
        checks.push(RubricCheck::new(
            "assumptions_disclosed",
            CheckKind::Structural,
            true,
            format!("{} assumption(s) recorded", response.assumptions.len()),
        ));
    }

    let event_ids: Vec<&str> = evidence
        .iter()
        .flat_map(|e| e.retrieval.result.events.iter())
        .map(|ev| ev.id.as_str())
        .filter(|id| !id.is_empty())
        .collect();
    if !event_ids.is_empty() {
        let found = event_ids.iter().any(|id| answer.contains(id));
        checks.push(RubricCheck::new(
            "event_ids_referenced",
            CheckKind::Structural,
            found,
            if found {
                "at least one event ID present in answer"
            } else {
                "no event IDs from evidence found in answer text"
            },
        ));
    }

    if !evidence.is_empty() && evidence.iter().all(|e| e.retrieval.result.is_empty()) {
        let explained = answer.trim().chars().count() > MIN_EXPLANATION_CHARS;
        checks.push(RubricCheck::new(
            "failure_explained",
            CheckKind::Structural,
            explained,
            if explained {
                "answer contains sufficient explanation"
            } else {
                "answer too brief for an empty result"
            },
        ));
    }

    let mentioned = numbers_in(answer);
    for log in logs.iter().filter(|l| l.result_type == ResultType::Count) {
        if let Some(count) = log.count {
            let found = mentioned.contains(&count);
            checks.push(RubricCheck::new(
                "count_value_in_answer",
                CheckKind::Grounding,
                found,
                format!(
                    "count={} {} in answer",
                    count,
                    if found { "found" } else { "NOT found" }
                ),
            ));
        }
    }

    let claims = count_claims(answer);
    if !claims.is_empty() {
        let citable = citable_numbers(response);
        let untraceable: Vec<u64> = claims
            .into_iter()
            .filter(|n| !citable.contains(n))
            .collect();
        checks.push(RubricCheck::new(
            "count_claims_traceable",
            CheckKind::Grounding,
            untraceable.is_empty(),
            if untraceable.is_empty() {
                "every quoted count matches a logged figure".to_string()
            } else {
                format!("counts not in any API call log: {:?}", untraceable)
            },
        ));
    }

    checks
}

/// Prompt body for the model checks.
pub fn build_input(
    intent: &ParsedIntent,
    response: &EnrichedResponse,
    evidence: &[Evidence],
) -> String {
    let urls = response
        .api_calls
        .iter()
        .map(|l| format!("  {}", l.url))
        .collect::<Vec<_>>()
        .join("\n");

    let summary = evidence
        .iter()
        .map(|e| match &e.label {
            Some(label) => format!("  [{}] {}", label, evidence_digest(&e.retrieval)),
            None => format!("  {}", evidence_digest(&e.retrieval)),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "USER REQUEST: {}\nREQUESTED REGION: {}\nREQUESTED AGGREGATION: {}\n\nAPI URLS USED:\n{}\n\nEVIDENCE SUMMARY:\n{}\n\nANSWER TEXT:\n{}",
        intent.restatement,
        intent.region.as_deref().unwrap_or("global / unspecified"),
        intent.aggregation.as_str(),
        urls,
        summary,
        truncate_chars(&response.answer_text, MAX_ANSWER_CHARS)
    )
}
