//! # Summariser Skill
//!
//! Writes the title and grounded answer from evidence blocks. The model
//! produces only those two fields; everything else in the
//! [`EnrichedResponse`] envelope is set here from pipeline state.

use super::capability::{LanguageModel, SummaryOutput};
use crate::error::TurnError;
use crate::state::{ApiCallLog, EnrichedResponse, ParsedIntent};
use crate::tools::Evidence;

pub struct SummariserSkill<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> SummariserSkill<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub async fn run(
        &self,
        intent: &ParsedIntent,
        assumptions: &[String],
        evidence: &[Evidence],
    ) -> Result<SummaryOutput, TurnError> {
        let input = build_input(intent, assumptions, evidence);
        let mut output = self
            .model
            .summarise(input)
            .await
            .map_err(|e| TurnError::capability("summariser", e))?;
        output.title = output.title.trim().to_string();
        output.answer_summary = output.answer_summary.trim().to_string();
        Ok(output)
    }
}

/// Prompt body: request, assumptions, then one evidence block per call.
pub fn build_input(intent: &ParsedIntent, assumptions: &[String], evidence: &[Evidence]) -> String {
    let assumptions_text = if assumptions.is_empty() {
        "  (none)".to_string()
    } else {
        assumptions
            .iter()
            .map(|a| format!("  • {}", a))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let blocks = evidence
        .iter()
        .map(Evidence::block)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "USER REQUEST:\n{}\n\nAGGREGATION: {}\n\nASSUMPTIONS applied while building the query:\n{}\n\n{}",
        intent.restatement,
        intent.aggregation.as_str(),
        assumptions_text,
        blocks
    )
}

/// Assemble the envelope. Evaluation fields are filled in later.
pub fn envelope(
    request_id: String,
    intent: &ParsedIntent,
    assumptions: Vec<String>,
    api_calls: Vec<ApiCallLog>,
    summary: SummaryOutput,
) -> EnrichedResponse {
    EnrichedResponse {
        request_id,
        title: summary.title,
        parsed_intent: intent.restatement.clone(),
        assumptions,
        api_calls,
        answer_text: summary.answer_summary,
        eval_score: 0,
        eval_passed: false,
        eval_failure_category: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Aggregation;
    use crate::testing::ScriptedModel;
    use crate::tools::{ApiResult, Retrieval};
    use chrono::Utc;

    fn count_evidence(count: u64) -> Evidence {
        Evidence {
            label: None,
            retrieval: Retrieval {
                url: "https://earthquake.usgs.gov/fdsnws/event/1/count?minmagnitude=6&format=geojson"
                    .into(),
                retrieved_at: Utc::now(),
                result: ApiResult::counted(count),
            },
            failure: None,
        }
    }

    #[test]
    fn test_input_contains_evidence_and_assumptions() {
        let intent = ParsedIntent {
            restatement: "How many M6+ earthquakes occurred globally this month?".into(),
            aggregation: Aggregation::Count,
            ..Default::default()
        };
        let input = build_input(
            &intent,
            &["No event type specified → defaulted to eventtype='earthquake'".into()],
            &[count_evidence(9)],
        );
        assert!(input.contains("AGGREGATION: count"));
        assert!(input.contains("  • No event type specified"));
        assert!(input.contains("Count: 9"));
    }

    #[test]
    fn test_input_without_assumptions() {
        let input = build_input(&ParsedIntent::default(), &[], &[]);
        assert!(input.contains("  (none)"));
    }

    #[tokio::test]
    async fn test_output_is_trimmed() {
        let model = ScriptedModel::new().with_summary(SummaryOutput {
            title: "  9 M6+ Earthquakes  ".into(),
            answer_summary: "\nThere were **9** earthquakes.\n".into(),
        });
        let output = SummariserSkill::new(&model)
            .run(&ParsedIntent::default(), &[], &[count_evidence(9)])
            .await
            .unwrap();
        assert_eq!(output.title, "9 M6+ Earthquakes");
        assert_eq!(output.answer_summary, "There were **9** earthquakes.");
    }
}
