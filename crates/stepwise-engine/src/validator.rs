//! Structural and length validation of generated learning steps.
//!
//! Validation is pure and deterministic. A step is accepted only if its
//! title is non-empty, its body holds 40 to 60 words, and the body carries
//! at least one visual scaffolding marker: a bullet, a numbered item, or an
//! embedded line break.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::step::{
    word_count, LearningStep, MAX_BODY_WORDS, MAX_LESSON_STEPS, MIN_BODY_WORDS, MIN_LESSON_STEPS,
};

/// A line that starts with a bullet (`-`, `*`, `•`) or a numeral-dot/paren prefix.
static MARKER_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*\x{2022}]|\d+[.)])\s+\S").ok());

/// Why a generated step was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RejectionReason {
    /// The title was empty or whitespace only.
    MissingTitle,
    /// The body was empty or whitespace only.
    MissingBody,
    /// The body word count fell outside `[40, 60]`.
    WordCount {
        /// The observed word count.
        count: usize,
    },
    /// The body had no bullet, numbered item, or line break.
    NoScaffolding,
    /// The generated text could not be parsed into steps.
    MalformedOutput {
        /// Description of the parse failure.
        message: String,
    },
    /// A batch contained fewer steps than required.
    StepCount {
        /// The number of steps found.
        found: usize,
    },
}

impl RejectionReason {
    /// Returns `true` if only the soft word-count rule was violated.
    ///
    /// Soft violations may be accepted in degraded form once retries are
    /// exhausted; every other reason is a hard failure.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::WordCount { .. })
    }

    /// Restates the violated constraint as an instruction for a retry prompt.
    #[must_use]
    pub fn restatement(&self) -> String {
        match self {
            Self::MissingTitle => {
                "Every step MUST have a non-empty \"title\" field.".to_string()
            }
            Self::MissingBody => "Every step MUST have a non-empty \"body\" field.".to_string(),
            Self::WordCount { count } => format!(
                "A step body had {count} words. Every body MUST contain between {MIN_BODY_WORDS} and {MAX_BODY_WORDS} words; count them before answering."
            ),
            Self::NoScaffolding => "Every body MUST be visually structured with bullet points (\"- \"), numbered items (\"1. \"), or line breaks (\"\\n\").".to_string(),
            Self::MalformedOutput { .. } => {
                "Your answer MUST be valid JSON in exactly the requested shape, with no other text.".to_string()
            }
            Self::StepCount { found } => format!(
                "You returned {found} step(s). Return between {MIN_LESSON_STEPS} and {MAX_LESSON_STEPS} steps."
            ),
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "missing title"),
            Self::MissingBody => write!(f, "missing body"),
            Self::WordCount { count } => write!(
                f,
                "body has {count} words (expected {MIN_BODY_WORDS}-{MAX_BODY_WORDS})"
            ),
            Self::NoScaffolding => write!(f, "body has no scaffolding marker"),
            Self::MalformedOutput { message } => write!(f, "malformed output: {message}"),
            Self::StepCount { found } => write!(
                f,
                "expected {MIN_LESSON_STEPS}-{MAX_LESSON_STEPS} steps, found {found}"
            ),
        }
    }
}

/// Outcome of validating one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The step satisfies every rule.
    Accepted,
    /// The step violates a rule.
    Rejected(RejectionReason),
}

impl ValidationResult {
    /// Returns `true` if the step was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Returns `true` if the body contains at least one scaffolding marker.
#[must_use]
pub fn has_scaffolding(body: &str) -> bool {
    if body.trim().contains('\n') {
        return true;
    }
    MARKER_LINE
        .as_ref()
        .is_some_and(|marker| marker.is_match(body))
}

/// Validates a step against the structural and length rules.
///
/// Structural rules are checked before length, so a step that is both
/// untitled and too short is reported as [`RejectionReason::MissingTitle`].
///
/// # Examples
///
/// ```
/// use stepwise_engine::{validate, LearningStep, RejectionReason, ValidationResult};
///
/// let step = LearningStep::new("", "- too short");
/// assert_eq!(
///     validate(&step),
///     ValidationResult::Rejected(RejectionReason::MissingTitle)
/// );
/// ```
#[must_use]
pub fn validate(step: &LearningStep) -> ValidationResult {
    if step.title.trim().is_empty() {
        return ValidationResult::Rejected(RejectionReason::MissingTitle);
    }
    if step.body.trim().is_empty() {
        return ValidationResult::Rejected(RejectionReason::MissingBody);
    }
    if !has_scaffolding(&step.body) {
        return ValidationResult::Rejected(RejectionReason::NoScaffolding);
    }

    let count = word_count(&step.body);
    if !(MIN_BODY_WORDS..=MAX_BODY_WORDS).contains(&count) {
        return ValidationResult::Rejected(RejectionReason::WordCount { count });
    }

    ValidationResult::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a body of exactly `words` words split across bullet lines.
    fn bullet_body(words: usize) -> String {
        let mut lines = Vec::new();
        let mut remaining = words;
        while remaining > 0 {
            let take = remaining.min(8);
            // "-" counts as a word.
            let filler = vec!["energy"; take.saturating_sub(1)].join(" ");
            lines.push(format!("- {filler}").trim_end().to_string());
            remaining -= take;
        }
        lines.join("\n")
    }

    #[test]
    fn test_bullet_body_helper_is_exact() {
        for n in [1, 8, 39, 40, 50, 60, 61] {
            assert_eq!(word_count(&bullet_body(n)), n);
        }
    }

    #[test]
    fn test_accepts_well_formed_step() {
        let step = LearningStep::new("What is work?", bullet_body(50));
        assert_eq!(validate(&step), ValidationResult::Accepted);
    }

    #[test]
    fn test_word_count_bounds_are_inclusive() {
        assert!(validate(&LearningStep::new("T", bullet_body(40))).is_accepted());
        assert!(validate(&LearningStep::new("T", bullet_body(60))).is_accepted());
        assert_eq!(
            validate(&LearningStep::new("T", bullet_body(39))),
            ValidationResult::Rejected(RejectionReason::WordCount { count: 39 })
        );
        assert_eq!(
            validate(&LearningStep::new("T", bullet_body(61))),
            ValidationResult::Rejected(RejectionReason::WordCount { count: 61 })
        );
    }

    #[test]
    fn test_rejects_missing_title() {
        let step = LearningStep::new("   ", bullet_body(50));
        assert_eq!(
            validate(&step),
            ValidationResult::Rejected(RejectionReason::MissingTitle)
        );
    }

    #[test]
    fn test_rejects_missing_body() {
        let step = LearningStep::new("Title", "  \n ");
        assert_eq!(
            validate(&step),
            ValidationResult::Rejected(RejectionReason::MissingBody)
        );
    }

    #[test]
    fn test_rejects_unscaffolded_prose() {
        let prose = vec!["word"; 50].join(" ");
        let step = LearningStep::new("Title", prose);
        assert_eq!(
            validate(&step),
            ValidationResult::Rejected(RejectionReason::NoScaffolding)
        );
    }

    #[test]
    fn test_scaffolding_markers() {
        assert!(has_scaffolding("first line\nsecond line"));
        assert!(has_scaffolding("- a single bullet"));
        assert!(has_scaffolding("* a starred bullet"));
        assert!(has_scaffolding("\u{2022} a dot bullet"));
        assert!(has_scaffolding("1. a numbered item"));
        assert!(has_scaffolding("2) a numbered item"));
        assert!(!has_scaffolding("plain prose with a dash - in the middle"));
        assert!(!has_scaffolding("trailing newline only\n"));
        assert!(!has_scaffolding("-nospace after dash"));
    }

    #[test]
    fn test_only_word_count_is_soft() {
        assert!(RejectionReason::WordCount { count: 12 }.is_soft());
        assert!(!RejectionReason::MissingTitle.is_soft());
        assert!(!RejectionReason::MissingBody.is_soft());
        assert!(!RejectionReason::NoScaffolding.is_soft());
        assert!(!RejectionReason::StepCount { found: 1 }.is_soft());
        assert!(!RejectionReason::MalformedOutput {
            message: "eof".to_string()
        }
        .is_soft());
    }

    #[test]
    fn test_restatement_names_the_constraint() {
        let text = RejectionReason::WordCount { count: 72 }.restatement();
        assert!(text.contains("72"));
        assert!(text.contains("between 40 and 60"));
        assert!(RejectionReason::NoScaffolding
            .restatement()
            .contains("bullet"));
    }
}
