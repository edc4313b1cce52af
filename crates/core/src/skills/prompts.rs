//! Default prompt templates bundled at compile time.

/// Classifier - picks the action and restates the request
pub const CLASSIFIER: &str = include_str!("defaults/classifier.md");

/// Normaliser - maps a request onto query fields
pub const NORMALISER: &str = include_str!("defaults/normaliser.md");

/// Summariser - grounded title and answer from evidence blocks
pub const SUMMARISER: &str = include_str!("defaults/summariser.md");

/// Evaluator - alignment and claims verification
pub const EVALUATOR: &str = include_str!("defaults/evaluator.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("classifier", CLASSIFIER),
        ("normaliser", NORMALISER),
        ("summariser", SUMMARISER),
        ("evaluator", EVALUATOR),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_classifier_names_every_action() {
        for tag in ["build_execute_query", "show_glossary", "answer_question"] {
            assert!(CLASSIFIER.contains(tag), "classifier prompt missing {}", tag);
        }
    }
}
