//! # Normaliser Skill
//!
//! Turns the newest user message plus recent turns into exactly one
//! [`Action`] and a [`ParsedIntent`].
//!
//! Two model calls:
//! 1. classification over a transcript of recent turns
//! 2. field extraction, only for data requests
//!
//! Whatever the user left out is filled from [`QueryDefaults`] and recorded as
//! an assumption. The normaliser never asks a clarifying question.

use chrono::NaiveDate;

use super::capability::{ClassifierOutput, ExtractedQuery, LanguageModel, QueryFields};
use crate::error::TurnError;
use crate::state::{Action, Aggregation, ParsedIntent, QueryTarget, Turn};
use crate::tools::glossary;
use crate::tools::{AlertLevel, EarthquakeQuery, Endpoint, OrderBy, QueryDefaults, ReviewStatus};

/// Normaliser result for one turn.
#[derive(Debug, Clone)]
pub struct Normalised {
    pub action: Action,
    pub intent: ParsedIntent,
    /// Every default or inference applied, in order
    pub assumptions: Vec<String>,
    /// Classifier reply for non-data turns
    pub reply: String,
    /// Glossary topic, when asked
    pub topic: Option<String>,
}

pub struct NormaliserSkill<'a> {
    model: &'a dyn LanguageModel,
    defaults: &'a QueryDefaults,
    history_window: usize,
}

impl<'a> NormaliserSkill<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        defaults: &'a QueryDefaults,
        history_window: usize,
    ) -> Self {
        Self {
            model,
            defaults,
            history_window,
        }
    }

    pub async fn run(
        &self,
        text: &str,
        history: &[Turn],
        today: NaiveDate,
    ) -> Result<Normalised, TurnError> {
        let transcript = build_transcript(history, self.history_window, text);
        let classification = self
            .model
            .classify(transcript)
            .await
            .map_err(|e| TurnError::capability("classifier", e))?;

        let action = resolve_action(&classification)?;
        tracing::debug!(
            action = %action,
            tag = %classification.action,
            needs_live_data = classification.needs_live_data,
            "Classified turn"
        );

        let restatement = if classification.restatement.trim().is_empty() {
            text.trim().to_string()
        } else {
            classification.restatement.trim().to_string()
        };

        if !action.requires_data() {
            return Ok(Normalised {
                action,
                intent: ParsedIntent::restated(restatement),
                assumptions: Vec::new(),
                reply: classification.reply,
                topic: classification.topic.filter(|t| !t.trim().is_empty()),
            });
        }

        let input = format!(
            "Today's date: {}\n\nUser request: {}\n\n{}",
            today.format("%Y-%m-%d"),
            restatement,
            glossary::format_for_llm()
        );
        let extracted = self
            .model
            .extract(input)
            .await
            .map_err(|e| TurnError::capability("normaliser", e))?;

        let (intent, assumptions) = build_intent(restatement, extracted, self.defaults, today);

        Ok(Normalised {
            action,
            intent,
            assumptions,
            reply: classification.reply,
            topic: None,
        })
    }
}

/// Strict tag parse, then the data bias: live data always wins.
fn resolve_action(classification: &ClassifierOutput) -> Result<Action, TurnError> {
    let tagged: Action = classification.action.parse()?;
    if classification.needs_live_data && !tagged.requires_data() {
        tracing::debug!(tag = %tagged, "Live data requested, routing to data pipeline");
        return Ok(Action::BuildExecuteQuery);
    }
    Ok(tagged)
}

/// Recent turns as plain text followed by the new message.
pub fn build_transcript(history: &[Turn], window: usize, text: &str) -> String {
    let start = history.len().saturating_sub(window);
    let mut out = String::new();
    if start < history.len() {
        out.push_str("## Conversation so far\n");
        for turn in &history[start..] {
            out.push_str(&format!("User: {}\n", turn.user_message));
            out.push_str(&format!("Assistant: {}\n", turn.assistant_message));
        }
        out.push('\n');
    }
    out.push_str("## Newest message\n");
    out.push_str(text.trim());
    out
}

fn parse_enum<T>(
    field: &str,
    value: Option<String>,
    parse: fn(&str) -> Option<T>,
    notes: &mut Vec<String>,
) -> Option<T> {
    let value = value?;
    let parsed = parse(&value);
    if parsed.is_none() {
        notes.push(format!(
            "Unrecognised {} value '{}' → ignored",
            field, value
        ));
    }
    parsed
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn to_query(fields: QueryFields, aggregation: Aggregation, notes: &mut Vec<String>) -> EarthquakeQuery {
    let eventid = non_blank(fields.eventid);
    // An id lookup always returns the event itself
    let endpoint = if aggregation == Aggregation::Count && eventid.is_none() {
        Endpoint::Count
    } else {
        Endpoint::Query
    };

    EarthquakeQuery {
        endpoint,
        eventid,
        starttime: non_blank(fields.starttime),
        endtime: non_blank(fields.endtime),
        updatedafter: non_blank(fields.updatedafter),
        latitude: fields.latitude,
        longitude: fields.longitude,
        maxradiuskm: fields.maxradiuskm,
        minlatitude: fields.minlatitude,
        maxlatitude: fields.maxlatitude,
        minlongitude: fields.minlongitude,
        maxlongitude: fields.maxlongitude,
        minmagnitude: fields.minmagnitude,
        maxmagnitude: fields.maxmagnitude,
        mindepth: fields.mindepth,
        maxdepth: fields.maxdepth,
        eventtype: non_blank(fields.eventtype),
        reviewstatus: parse_enum("reviewstatus", fields.reviewstatus, ReviewStatus::parse, notes),
        alertlevel: parse_enum("alertlevel", fields.alertlevel, AlertLevel::parse, notes),
        producttype: non_blank(fields.producttype),
        minfelt: fields.minfelt,
        minsig: fields.minsig,
        orderby: parse_enum("orderby", fields.orderby, OrderBy::parse, notes),
        limit: fields.limit,
    }
}

/// Extremum requests want the single top event.
fn apply_extremum_defaults(query: &mut EarthquakeQuery, notes: &mut Vec<String>) {
    if query.eventid.is_some() {
        return;
    }
    if query.orderby.is_none() {
        query.orderby = Some(OrderBy::Magnitude);
        notes.push(
            "No ordering given for an extreme-event request → orderby=magnitude (largest first)"
                .to_string(),
        );
    }
    if query.limit.is_none() {
        query.limit = Some(1);
        notes.push("Extreme-event request → limit=1 (top event only)".to_string());
    }
}

/// Resolve extracted fields into query targets, applying every default.
pub fn build_intent(
    restatement: String,
    extracted: ExtractedQuery,
    defaults: &QueryDefaults,
    today: NaiveDate,
) -> (ParsedIntent, Vec<String>) {
    let mut assumptions: Vec<String> = extracted
        .assumptions
        .into_iter()
        .filter(|a| !a.trim().is_empty())
        .collect();

    let aggregation = match Aggregation::parse(&extracted.aggregation) {
        Some(aggregation) => aggregation,
        None => {
            assumptions.push(format!(
                "Unrecognised aggregation '{}' → treated as a list of events",
                extracted.aggregation
            ));
            Aggregation::List
        }
    };

    let region = non_blank(extracted.region);
    let raw_targets: Vec<(Option<String>, QueryFields)> = if extracted.comparisons.is_empty() {
        vec![(region.clone(), extracted.query)]
    } else {
        extracted
            .comparisons
            .into_iter()
            .map(|c| (Some(c.label), c.query))
            .collect()
    };
    let labelled = raw_targets.len() > 1;

    let mut explicit_fields: Vec<String> = Vec::new();
    let mut targets = Vec::with_capacity(raw_targets.len());

    for (label, fields) in raw_targets {
        let mut notes = Vec::new();
        let mut query = to_query(fields, aggregation, &mut notes);
        query.resolve_geometry_conflict();

        for field in query.provided_fields() {
            if !explicit_fields.iter().any(|f| f == field) {
                explicit_fields.push(field.to_string());
            }
        }
        if query.limit.is_some() && !explicit_fields.iter().any(|f| f == "limit") {
            explicit_fields.push("limit".to_string());
        }

        if aggregation == Aggregation::Extremum {
            apply_extremum_defaults(&mut query, &mut notes);
        }
        notes.extend(defaults.apply(&mut query, today));

        for note in notes {
            let note = match (&label, labelled) {
                (Some(label), true) => format!("{}: {}", label, note),
                _ => note,
            };
            assumptions.push(note);
        }

        targets.push(QueryTarget { label, query });
    }

    let intent = ParsedIntent {
        restatement,
        region,
        aggregation,
        targets,
        explicit_fields,
    };
    (intent, assumptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::capability::RegionQuery;
    use crate::state::Message;
    use crate::testing::ScriptedModel;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn classification(action: &str, needs_live_data: bool) -> ClassifierOutput {
        ClassifierOutput {
            action: action.to_string(),
            needs_live_data,
            restatement: "restated".to_string(),
            topic: None,
            reply: "reply".to_string(),
        }
    }

    #[test]
    fn test_live_data_overrides_tag() {
        let action = resolve_action(&classification("answer_question", true)).unwrap();
        assert_eq!(action, Action::BuildExecuteQuery);
        let action = resolve_action(&classification("show_glossary", false)).unwrap();
        assert_eq!(action, Action::ShowGlossary);
    }

    #[test]
    fn test_unknown_tag_is_fatal_even_with_live_data() {
        let err = resolve_action(&classification("normalise_query", true)).unwrap_err();
        assert!(matches!(err, TurnError::Classification(_)));
    }

    #[test]
    fn test_transcript_window() {
        let turns: Vec<Turn> = (0..4)
            .map(|i| Turn {
                user_message: format!("q{}", i),
                assistant_message: format!("a{}", i),
                action: Action::AnswerQuestion,
                enriched_response: None,
                messages: vec![Message::user(format!("q{}", i))],
                completed_at: Utc::now(),
            })
            .collect();
        let transcript = build_transcript(&turns, 2, " and Chile? ");
        assert!(!transcript.contains("q1"));
        assert!(transcript.contains("User: q2"));
        assert!(transcript.ends_with("## Newest message\nand Chile?"));
        assert_eq!(build_transcript(&[], 2, "hi"), "## Newest message\nhi");
    }

    #[test]
    fn test_fully_specified_count_has_no_assumptions() {
        let extracted = ExtractedQuery {
            aggregation: "count".into(),
            query: QueryFields {
                starttime: Some("2026-10-01".into()),
                endtime: Some("2026-10-17".into()),
                minmagnitude: Some(6.0),
                eventtype: Some("earthquake".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (intent, assumptions) =
            build_intent("count".into(), extracted, &QueryDefaults::default(), today());
        assert!(assumptions.is_empty(), "{:?}", assumptions);
        assert_eq!(intent.targets.len(), 1);
        assert_eq!(intent.targets[0].query.endpoint, Endpoint::Count);
        assert_eq!(intent.magnitude_filter(), (Some(6.0), None));
        assert_eq!(
            intent.time_range(),
            (Some("2026-10-01"), Some("2026-10-17"))
        );
    }

    #[test]
    fn test_extraction_reads_fields_key() {
        let extracted: ExtractedQuery = serde_json::from_value(serde_json::json!({
            "aggregation": "count",
            "fields": { "minmagnitude": 6.0, "starttime": "2026-10-01" },
            "comparisons": [
                { "label": "Japan", "fields": { "minlatitude": 30.0 } }
            ]
        }))
        .unwrap();
        assert_eq!(extracted.query.minmagnitude, Some(6.0));
        assert_eq!(extracted.comparisons[0].query.minlatitude, Some(30.0));

        let json = serde_json::to_value(&extracted).unwrap();
        assert!(json.get("fields").is_some());
        assert!(json.get("query").is_none());
    }

    #[test]
    fn test_unknown_aggregation_defaults_to_list() {
        let extracted = ExtractedQuery {
            aggregation: "histogram".into(),
            ..Default::default()
        };
        let (intent, assumptions) =
            build_intent("x".into(), extracted, &QueryDefaults::default(), today());
        assert_eq!(intent.aggregation, Aggregation::List);
        assert!(assumptions[0].contains("histogram"));
        assert_eq!(intent.targets[0].query.endpoint, Endpoint::Query);
    }

    #[test]
    fn test_extremum_defaults() {
        let extracted = ExtractedQuery {
            aggregation: "extremum".into(),
            query: QueryFields {
                starttime: Some("2026-10-01".into()),
                endtime: Some("2026-10-17".into()),
                minmagnitude: Some(5.0),
                eventtype: Some("earthquake".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (intent, assumptions) =
            build_intent("biggest".into(), extracted, &QueryDefaults::default(), today());
        let query = &intent.targets[0].query;
        assert_eq!(query.orderby, Some(OrderBy::Magnitude));
        assert_eq!(query.limit, Some(1));
        assert_eq!(assumptions.len(), 2);
    }

    #[test]
    fn test_comparison_yields_labelled_targets() {
        let japan = QueryFields {
            minlatitude: Some(30.0),
            maxlatitude: Some(46.0),
            minlongitude: Some(130.0),
            maxlongitude: Some(146.0),
            ..Default::default()
        };
        let chile = QueryFields {
            minlatitude: Some(-56.0),
            maxlatitude: Some(-17.0),
            minlongitude: Some(-76.0),
            maxlongitude: Some(-66.0),
            ..Default::default()
        };
        let extracted = ExtractedQuery {
            aggregation: "count".into(),
            comparisons: vec![
                RegionQuery {
                    label: "Japan".into(),
                    query: japan,
                },
                RegionQuery {
                    label: "Chile".into(),
                    query: chile,
                },
            ],
            ..Default::default()
        };
        let (intent, assumptions) =
            build_intent("compare".into(), extracted, &QueryDefaults::default(), today());
        assert_eq!(intent.targets.len(), 2);
        assert_eq!(intent.targets[1].label.as_deref(), Some("Chile"));
        assert!(assumptions.iter().any(|a| a.starts_with("Japan: ")));
        assert!(assumptions.iter().any(|a| a.starts_with("Chile: ")));
    }

    #[test]
    fn test_bad_enum_value_becomes_assumption() {
        let extracted = ExtractedQuery {
            aggregation: "list".into(),
            query: QueryFields {
                orderby: Some("loudest".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (intent, assumptions) =
            build_intent("x".into(), extracted, &QueryDefaults::default(), today());
        assert!(intent.targets[0].query.orderby.is_none());
        assert!(assumptions.iter().any(|a| a.contains("'loudest'")));
    }

    #[tokio::test]
    async fn test_glossary_turn_skips_extraction() {
        let model = ScriptedModel::new().with_classification(ClassifierOutput {
            action: "show_glossary".into(),
            needs_live_data: false,
            restatement: "What does magnitude mean?".into(),
            topic: Some("magnitude".into()),
            reply: "Magnitude measures energy released.".into(),
        });
        let defaults = QueryDefaults::default();
        let skill = NormaliserSkill::new(&model, &defaults, 6);
        let normalised = skill
            .run("What does magnitude mean?", &[], today())
            .await
            .unwrap();
        assert_eq!(normalised.action, Action::ShowGlossary);
        assert_eq!(normalised.topic.as_deref(), Some("magnitude"));
        assert!(normalised.intent.targets.is_empty());
        assert_eq!(model.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_model_outage_is_capability_error() {
        let model = ScriptedModel::new();
        let defaults = QueryDefaults::default();
        let skill = NormaliserSkill::new(&model, &defaults, 6);
        let err = skill.run("hi", &[], today()).await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::CapabilityUnavailable {
                stage: "classifier",
                ..
            }
        ));
    }
}
