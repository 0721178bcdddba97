//! Comprehension levels and the median aggregation that produces them.
//!
//! A learner's level is always derived from exactly five graded answers:
//! the grades are sorted and the middle value wins. Sessions may later lower
//! the level one tier at a time through `simplify`, never below 1.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepwiseError};

/// Number of graded answers the level calculation requires.
pub const REQUIRED_ANSWERS: usize = 5;

/// Lowest comprehension level (elementary, concrete).
pub const MIN_LEVEL: u8 = 1;

/// Highest comprehension level (advanced, nuanced).
pub const MAX_LEVEL: u8 = 4;

/// A comprehension level in `[1, 4]`.
///
/// Controls the vocabulary and abstraction tier used when generating
/// learning steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ComprehensionLevel(u8);

impl ComprehensionLevel {
    /// The elementary tier.
    pub const ELEMENTARY: Self = Self(MIN_LEVEL);

    /// The advanced tier.
    pub const ADVANCED: Self = Self(MAX_LEVEL);

    /// Creates a level if `value` lies in `[1, 4]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise_engine::ComprehensionLevel;
    ///
    /// assert!(ComprehensionLevel::new(3).is_some());
    /// assert!(ComprehensionLevel::new(0).is_none());
    /// assert!(ComprehensionLevel::new(5).is_none());
    /// ```
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value >= MIN_LEVEL && value <= MAX_LEVEL {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the numeric value of this level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns `true` if this is the lowest level.
    #[must_use]
    pub const fn is_lowest(self) -> bool {
        self.0 == MIN_LEVEL
    }

    /// Returns the next lower level, or `None` at level 1.
    #[must_use]
    pub const fn simplified(self) -> Option<Self> {
        if self.0 > MIN_LEVEL {
            Some(Self(self.0 - 1))
        } else {
            None
        }
    }

    /// Returns the vocabulary and abstraction directive for this tier.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self.0 {
            1 => "Use elementary, everyday words and concrete examples from daily life. Avoid technical terms; if one is unavoidable, explain it in plain words.",
            2 => "Use simple academic language. Introduce each key term with a short definition and a relatable example.",
            3 => "Use standard academic vocabulary, as in a school textbook, and include some abstract reasoning alongside examples.",
            _ => "Use advanced, precise terminology and discuss nuances, limiting cases, and connections between ideas.",
        }
    }

    /// Returns a short human-readable label for this tier.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            1 => "elementary",
            2 => "simple academic",
            3 => "standard academic",
            _ => "advanced",
        }
    }
}

impl TryFrom<i64> for ComprehensionLevel {
    type Error = StepwiseError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(StepwiseError::InvalidLevel { level: value })
    }
}

impl From<ComprehensionLevel> for u8 {
    fn from(level: ComprehensionLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for ComprehensionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes a comprehension level from exactly five complexity grades.
///
/// The grades are sorted and the third (middle) value is returned. With an
/// odd count there is no tie to break.
///
/// # Errors
///
/// Returns `StepwiseError::InvalidInput` if there are not exactly five grades
/// or any grade lies outside `[1, 4]`.
///
/// # Examples
///
/// ```
/// use stepwise_engine::calculate_level;
///
/// let level = calculate_level(&[1, 4, 2, 3, 4]).unwrap();
/// assert_eq!(level.value(), 3);
/// ```
pub fn calculate_level(complexities: &[u8]) -> Result<ComprehensionLevel> {
    if complexities.len() != REQUIRED_ANSWERS {
        return Err(StepwiseError::invalid_input(format!(
            "expected {REQUIRED_ANSWERS} complexity grades, got {}",
            complexities.len()
        )));
    }

    if let Some(bad) = complexities
        .iter()
        .find(|grade| !(MIN_LEVEL..=MAX_LEVEL).contains(*grade))
    {
        return Err(StepwiseError::invalid_input(format!(
            "complexity grade {bad} is outside [{MIN_LEVEL}, {MAX_LEVEL}]"
        )));
    }

    let mut sorted = complexities.to_vec();
    sorted.sort_unstable();
    let median = sorted[REQUIRED_ANSWERS / 2];

    ComprehensionLevel::new(median)
        .ok_or_else(|| StepwiseError::invalid_input(format!("median {median} is not a level")))
}
