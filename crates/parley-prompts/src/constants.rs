//! Fixed vocabulary of the contextual selector.

/// Template id chosen when tutoring intent is detected.
pub const LEARNING_TUTOR_TEMPLATE: &str = "learning-tutor";

/// Phrases in the most recent message that signal tutoring intent.
pub const TRIGGER_PHRASES: &[&str] = &[
    "learn about",
    "teach me",
    "explain",
    "how does",
    "what is",
    "help me understand",
];

/// Phrases anywhere in the transcript that signal tutoring intent.
pub const HISTORY_PHRASES: &[&str] = &["lesson", "study"];

/// UI-facing template labels mapped to filesystem template ids.
pub const TEMPLATE_ALIASES: &[(&str, &str)] = &[
    ("Training Agent", "training-agent"),
    ("training_agent", "training-agent"),
    ("Learning Tutor", "learning-tutor"),
    ("learning_tutor", "learning-tutor"),
];

/// Subject used when no tutoring subject can be extracted.
pub const DEFAULT_SUBJECT: &str = "general topic";

/// Assumed learner level when none is known.
pub const DEFAULT_LEARNING_LEVEL: &str = "intermediate";

/// Assumed learning style for conversational sessions.
pub const DEFAULT_LEARNING_STYLE: &str = "conversational";

/// `scenario_details` value when scenario lookup misses.
pub const SCENARIO_DETAILS_FALLBACK: &str =
    "A realistic practice conversation with no specific scenario details.";

/// `exit_criteria` value when scenario lookup misses.
pub const EXIT_CRITERIA_FALLBACK: &str = "The conversation reaches a natural close.";

/// Map a caller-supplied template label to a filesystem template id.
///
/// Known ids pass through; unrecognized labels unconditionally fall back
/// to the default id.
pub fn resolve_alias(label: &str, default_id: &str) -> String {
    for (alias, id) in TEMPLATE_ALIASES {
        if label.eq_ignore_ascii_case(alias) || label == *id {
            return (*id).to_string();
        }
    }
    if label == default_id {
        return default_id.to_string();
    }
    default_id.to_string()
}
