//! # Supervisor / Router
//!
//! Dispatch on the closed [`Action`] set. Only data requests go on to the
//! executor; the other two are answered here without touching the catalog.

use crate::skills::Normalised;
use crate::state::Action;
use crate::tools::glossary;

const FALLBACK_REPLY: &str =
    "I can look up earthquakes from the USGS catalog or explain the query terms it uses.";

/// Where the coordinator goes next.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Run executor, summariser and evaluator
    Data,
    /// Finish with this assistant message
    Reply(String),
}

pub fn route(normalised: &Normalised) -> Route {
    match normalised.action {
        Action::BuildExecuteQuery => Route::Data,
        Action::ShowGlossary => Route::Reply(glossary_reply(
            &normalised.reply,
            normalised.topic.as_deref(),
        )),
        Action::AnswerQuestion => {
            let reply = normalised.reply.trim();
            if reply.is_empty() {
                Route::Reply(FALLBACK_REPLY.to_string())
            } else {
                Route::Reply(reply.to_string())
            }
        }
    }
}

/// Lead-in plus the matching entries; the whole glossary when nothing matches.
pub fn glossary_reply(lead_in: &str, topic: Option<&str>) -> String {
    let entries = topic.map(glossary::lookup).unwrap_or_default();
    let body = if entries.is_empty() {
        glossary::full_for_user()
    } else {
        glossary::format_for_user(&entries)
    };
    let lead_in = lead_in.trim();
    if lead_in.is_empty() {
        body
    } else {
        format!("{}\n\n{}", lead_in, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ParsedIntent;

    fn normalised(action: Action, reply: &str, topic: Option<&str>) -> Normalised {
        Normalised {
            action,
            intent: ParsedIntent::restated("q"),
            assumptions: vec![],
            reply: reply.into(),
            topic: topic.map(str::to_string),
        }
    }

    #[test]
    fn test_data_request_routes_to_pipeline() {
        let route = route(&normalised(Action::BuildExecuteQuery, "", None));
        assert_eq!(route, Route::Data);
    }

    #[test]
    fn test_glossary_topic_narrows_entries() {
        let Route::Reply(text) = route(&normalised(
            Action::ShowGlossary,
            "Magnitude measures the size of an earthquake.",
            Some("magnitude"),
        )) else {
            panic!("expected a reply");
        };
        assert!(text.starts_with("Magnitude measures"));
        assert!(text.contains("`minmagnitude`"));
        assert!(!text.contains("`alertlevel`"));
    }

    #[test]
    fn test_unmatched_topic_shows_full_glossary() {
        let text = glossary_reply("", Some("zzzz"));
        assert_eq!(text, glossary::full_for_user());
    }

    #[test]
    fn test_conversational_reply_passes_through() {
        assert_eq!(
            route(&normalised(Action::AnswerQuestion, " Hello! ", None)),
            Route::Reply("Hello!".into())
        );
        assert_eq!(
            route(&normalised(Action::AnswerQuestion, "", None)),
            Route::Reply(FALLBACK_REPLY.into())
        );
    }
}
