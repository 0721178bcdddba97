//! Error types for the Stepwise engine.
//!
//! This module defines the error hierarchy for all engine operations,
//! grouped the way callers need to branch on them: input errors, backend
//! (generation) errors, session lifecycle errors, and configuration errors.
//! Every error exposes an [`ErrorKind`] so callers never match on strings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::GenerationError;

/// A specialized `Result` type for Stepwise engine operations.
pub type Result<T> = std::result::Result<T, StepwiseError>;

/// Errors that can occur while assessing learners, generating content,
/// or driving learning sessions.
#[derive(Debug, thiserror::Error)]
pub enum StepwiseError {
    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Caller-supplied data was malformed (grades, identifiers, request fields).
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// The requested subject is not one of the supported subjects.
    #[error("Invalid subject: '{subject}'\n\nSuggestion: Use one of: {supported}")]
    InvalidSubject {
        /// The subject as supplied by the caller.
        subject: String,
        /// Comma-separated list of supported subjects.
        supported: String,
    },

    /// The topic was empty or whitespace only.
    #[error("Invalid topic: topic must not be empty\n\nSuggestion: Name the textbook topic to study, e.g. 'Work' or 'Photosynthesis'")]
    InvalidTopic,

    /// The comprehension level was outside `[1, 4]`.
    #[error("Invalid comprehension level: {level}\n\nSuggestion: Use a level between 1 and 4, or take the assessment first")]
    InvalidLevel {
        /// The level as supplied by the caller.
        level: i64,
    },

    /// The session command was not one of `next`, `simplify`, `exit`.
    #[error("Invalid command: '{command}'\n\nSuggestion: Use one of: next, simplify, exit")]
    InvalidCommand {
        /// The command as supplied by the caller.
        command: String,
    },

    /// No assessment exists with the given identifier.
    #[error("Assessment not found: {id}\n\nSuggestion: Start a new assessment; unfinished assessments expire after inactivity")]
    AssessmentNotFound {
        /// The unknown assessment identifier.
        id: Uuid,
    },

    /// The assessment has no question with the given identifier.
    #[error("Question not found: '{question}'")]
    QuestionNotFound {
        /// The unknown question identifier.
        question: String,
    },

    /// The question has no option with the given identifier.
    #[error("Option '{option}' not found for question '{question}'")]
    OptionNotFound {
        /// The question that was answered.
        question: String,
        /// The unknown option identifier.
        option: String,
    },

    /// No comprehension level has been recorded for the learner.
    #[error("No comprehension level recorded for learner '{learner}'\n\nSuggestion: Complete an assessment for this learner first")]
    LearnerLevelNotFound {
        /// The learner identity.
        learner: String,
    },

    /// The question was already answered in this assessment.
    #[error("Question '{question}' has already been answered\n\nSuggestion: Answers are final; start a new assessment to change them")]
    DuplicateAnswer {
        /// The question that was answered twice.
        question: String,
    },

    /// A level was requested before every question was answered.
    #[error("Assessment incomplete: {answered} of {required} questions answered")]
    IncompleteAssessment {
        /// Number of questions answered so far.
        answered: usize,
        /// Number of questions that must be answered.
        required: usize,
    },

    // ========================================================================
    // Session Lifecycle Errors
    // ========================================================================
    /// No session exists with the given identifier (or it expired).
    #[error("Session not found: {id}")]
    SessionNotFound {
        /// The unknown session identifier.
        id: Uuid,
    },

    /// The session has terminated and accepts no further commands.
    #[error("Session {id} is no longer active\n\nSuggestion: Start a new session to keep learning")]
    SessionInactive {
        /// The terminated session identifier.
        id: Uuid,
    },

    /// Another command changed the session while content was being regenerated.
    #[error("Session {id} changed while the step was being regenerated\n\nSuggestion: Retry the command")]
    SessionConflict {
        /// The session identifier.
        id: Uuid,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The generation backend did not answer within the deadline.
    #[error("Generation timed out after {timeout_ms}ms\n\nSuggestion: Retry; the generation backend is responding slowly")]
    GenerationTimeout {
        /// The deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The generation backend could not be reached.
    #[error("Generation backend unavailable: {message}\n\nSuggestion: Check that the generation endpoint is running and reachable")]
    GenerationUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The attempts were used up without acceptable content.
    #[error("Generation failed after {attempts} attempt(s): {reason}")]
    GenerationFailed {
        /// Number of attempts made.
        attempts: u32,
        /// The rejection reason of the final attempt.
        reason: String,
    },

    /// The context retriever failed. Never surfaced to callers; retrieval
    /// failures degrade to "no context".
    #[error("Context retrieval failed: {message}")]
    RetrievalFailed {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your stepwise.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Enumerable error kinds exposed to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed assessment input.
    InvalidInput,
    /// Unknown assessment, question, option, or learner.
    NotFound,
    /// A question was answered twice.
    DuplicateAnswer,
    /// Level requested before all answers were submitted.
    IncompleteAssessment,
    /// Unsupported subject.
    InvalidSubject,
    /// Empty topic.
    InvalidTopic,
    /// Level outside `[1, 4]`.
    InvalidLevel,
    /// Unknown session command.
    InvalidCommand,
    /// Unknown or expired session.
    SessionNotFound,
    /// Command against a terminated session.
    SessionInactive,
    /// Concurrent modification during regeneration.
    SessionConflict,
    /// Generation deadline exceeded.
    GenerationTimeout,
    /// Generation backend unreachable.
    GenerationUnavailable,
    /// Generated content never passed validation.
    GenerationFailed,
    /// Configuration could not be loaded.
    Config,
    /// Anything else.
    Internal,
}

/// Coarse grouping of [`ErrorKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied bad input; never retried.
    Input,
    /// The generation backend misbehaved.
    Backend,
    /// The session is unknown, terminated, or busy.
    Lifecycle,
    /// Configuration is invalid.
    Config,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Returns the category this kind belongs to.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidInput
            | Self::NotFound
            | Self::DuplicateAnswer
            | Self::IncompleteAssessment
            | Self::InvalidSubject
            | Self::InvalidTopic
            | Self::InvalidLevel
            | Self::InvalidCommand => ErrorCategory::Input,
            Self::GenerationTimeout | Self::GenerationUnavailable | Self::GenerationFailed => {
                ErrorCategory::Backend
            }
            Self::SessionNotFound | Self::SessionInactive | Self::SessionConflict => {
                ErrorCategory::Lifecycle
            }
            Self::Config => ErrorCategory::Config,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::DuplicateAnswer => "duplicate_answer",
            Self::IncompleteAssessment => "incomplete_assessment",
            Self::InvalidSubject => "invalid_subject",
            Self::InvalidTopic => "invalid_topic",
            Self::InvalidLevel => "invalid_level",
            Self::InvalidCommand => "invalid_command",
            Self::SessionNotFound => "session_not_found",
            Self::SessionInactive => "session_inactive",
            Self::SessionConflict => "session_conflict",
            Self::GenerationTimeout => "generation_timeout",
            Self::GenerationUnavailable => "generation_unavailable",
            Self::GenerationFailed => "generation_failed",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<GenerationError> for StepwiseError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Timeout { after_ms } => Self::GenerationTimeout {
                timeout_ms: after_ms,
            },
            GenerationError::Unavailable { message } => Self::GenerationUnavailable { message },
            GenerationError::MalformedOutput { message } => Self::GenerationFailed {
                attempts: 1,
                reason: format!("malformed output: {message}"),
            },
        }
    }
}

impl StepwiseError {
    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidSubject` error listing the supported subjects.
    #[must_use]
    pub fn invalid_subject(subject: impl Into<String>) -> Self {
        Self::InvalidSubject {
            subject: subject.into(),
            supported: crate::Subject::supported_names().join(", "),
        }
    }

    /// Creates a new `InvalidCommand` error.
    #[must_use]
    pub fn invalid_command(command: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command: command.into(),
        }
    }

    /// Creates a new `QuestionNotFound` error.
    #[must_use]
    pub fn question_not_found(question: impl Into<String>) -> Self {
        Self::QuestionNotFound {
            question: question.into(),
        }
    }

    /// Creates a new `OptionNotFound` error.
    #[must_use]
    pub fn option_not_found(question: impl Into<String>, option: impl Into<String>) -> Self {
        Self::OptionNotFound {
            question: question.into(),
            option: option.into(),
        }
    }

    /// Creates a new `DuplicateAnswer` error.
    #[must_use]
    pub fn duplicate_answer(question: impl Into<String>) -> Self {
        Self::DuplicateAnswer {
            question: question.into(),
        }
    }

    /// Creates a new `GenerationUnavailable` error.
    #[must_use]
    pub fn generation_unavailable(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `GenerationFailed` error.
    #[must_use]
    pub fn generation_failed(attempts: u32, reason: impl std::fmt::Display) -> Self {
        Self::GenerationFailed {
            attempts,
            reason: reason.to_string(),
        }
    }

    /// Creates a new `RetrievalFailed` error.
    #[must_use]
    pub fn retrieval_failed(message: impl Into<String>) -> Self {
        Self::RetrievalFailed {
            message: message.into(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns the enumerable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::InvalidSubject { .. } => ErrorKind::InvalidSubject,
            Self::InvalidTopic => ErrorKind::InvalidTopic,
            Self::InvalidLevel { .. } => ErrorKind::InvalidLevel,
            Self::InvalidCommand { .. } => ErrorKind::InvalidCommand,
            Self::AssessmentNotFound { .. }
            | Self::QuestionNotFound { .. }
            | Self::OptionNotFound { .. }
            | Self::LearnerLevelNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateAnswer { .. } => ErrorKind::DuplicateAnswer,
            Self::IncompleteAssessment { .. } => ErrorKind::IncompleteAssessment,
            Self::SessionNotFound { .. } => ErrorKind::SessionNotFound,
            Self::SessionInactive { .. } => ErrorKind::SessionInactive,
            Self::SessionConflict { .. } => ErrorKind::SessionConflict,
            Self::GenerationTimeout { .. } => ErrorKind::GenerationTimeout,
            Self::GenerationUnavailable { .. } => ErrorKind::GenerationUnavailable,
            Self::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } => ErrorKind::Config,
            Self::RetrievalFailed { .. } | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if this error is transient and the caller may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GenerationTimeout { .. }
                | Self::GenerationUnavailable { .. }
                | Self::SessionConflict { .. }
        )
    }
}
