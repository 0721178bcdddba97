//! The fixed set of textbook subjects a session can cover.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StepwiseError;

/// A supported textbook subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Physics.
    Physics,
    /// Chemistry.
    Chemistry,
    /// Biology.
    Biology,
    /// Mathematics.
    Mathematics,
    /// History.
    History,
    /// Geography.
    Geography,
    /// Economics.
    Economics,
}

impl Subject {
    /// Every supported subject, in display order.
    pub const ALL: [Self; 7] = [
        Self::Physics,
        Self::Chemistry,
        Self::Biology,
        Self::Mathematics,
        Self::History,
        Self::Geography,
        Self::Economics,
    ];

    /// Returns the display name of this subject.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Physics => "Physics",
            Self::Chemistry => "Chemistry",
            Self::Biology => "Biology",
            Self::Mathematics => "Mathematics",
            Self::History => "History",
            Self::Geography => "Geography",
            Self::Economics => "Economics",
        }
    }

    /// Returns the display names of every supported subject.
    #[must_use]
    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.name()).collect()
    }

    /// Parses a subject name, case-insensitively and ignoring surrounding whitespace.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|subject| subject.name().eq_ignore_ascii_case(wanted))
    }
}

impl FromStr for Subject {
    type Err = StepwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| StepwiseError::invalid_subject(s))
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid subject '{s}': expected one of {}",
                Self::supported_names().join(", ")
            ))
        })
    }
}

impl Serialize for Subject {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}
