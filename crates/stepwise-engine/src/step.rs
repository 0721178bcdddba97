//! Learning steps: short, titled, scaffolded explanation units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum number of words in a step body.
pub const MIN_BODY_WORDS: usize = 40;

/// Maximum number of words in a step body.
pub const MAX_BODY_WORDS: usize = 60;

/// Fewest steps a generated lesson may contain.
pub const MIN_LESSON_STEPS: usize = 3;

/// Most steps a generated lesson may contain.
pub const MAX_LESSON_STEPS: usize = 5;

/// One titled explanation unit covering exactly one concept.
///
/// Steps are immutable once accepted. Regeneration produces a new step
/// with a fresh `id` rather than editing an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStep {
    /// Unique identity of this step instance.
    pub id: Uuid,

    /// Short heading for the step.
    pub title: String,

    /// Explanation text, 40 to 60 words with visual scaffolding.
    pub body: String,

    /// `true` if the step was accepted despite violating the word-count rule.
    #[serde(default)]
    pub degraded: bool,

    /// When the step was produced.
    pub created_at: DateTime<Utc>,
}

impl LearningStep {
    /// Creates a new step with a fresh identity.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            degraded: false,
            created_at: Utc::now(),
        }
    }

    /// Returns this step flagged as a degraded acceptance.
    #[must_use]
    pub fn into_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// Returns the number of words in the body.
    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count(&self.body)
    }
}

/// Counts words as maximal runs of non-whitespace characters.
///
/// # Examples
///
/// ```
/// use stepwise_engine::step::word_count;
///
/// assert_eq!(word_count("- Force moves\nobjects."), 4);
/// assert_eq!(word_count("   "), 0);
/// ```
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
