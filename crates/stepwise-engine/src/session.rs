//! Learning session state machine.
//!
//! A session is `Active` until the learner exits or steps past the last
//! step, then `Terminated` for good. Commands:
//!
//! - `next` moves the cursor forward, or completes the session from the last step.
//! - `simplify` lowers the level one tier and replaces the current step.
//! - `exit` terminates unconditionally.
//!
//! `simplify` needs a generation call, which must not run under the session
//! lock. It is therefore split in two: [`Session::plan_simplify`] captures a
//! [`RegenerationTicket`] (including the session revision), and
//! [`Session::apply_regeneration`] installs the new step only if no other
//! command changed the session in between.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StepwiseError};
use crate::level::ComprehensionLevel;
use crate::step::LearningStep;
use crate::subject::Subject;

// ============================================================================
// Status and commands
// ============================================================================

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting commands.
    #[default]
    Active,
    /// Finished or exited; accepts no further commands.
    Terminated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// A learner command against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Move to the next step.
    Next,
    /// Lower the level and regenerate the current step.
    Simplify,
    /// End the session.
    Exit,
}

impl FromStr for Command {
    type Err = StepwiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "next" => Ok(Self::Next),
            "simplify" => Ok(Self::Simplify),
            "exit" => Ok(Self::Exit),
            _ => Err(StepwiseError::invalid_command(s)),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::Simplify => write!(f, "simplify"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// What a command did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The cursor moved to the next step.
    Advanced,
    /// `next` from the last step finished the session.
    Completed,
    /// The learner exited.
    Exited,
    /// The level was lowered and the current step replaced.
    Simplified,
    /// Nothing changed (`simplify` at the lowest level).
    Unchanged,
}

// ============================================================================
// Views
// ============================================================================

/// Snapshot of a session for callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session identifier.
    pub id: Uuid,
    /// Subject.
    pub subject: Subject,
    /// Topic.
    pub topic: String,
    /// Current comprehension level.
    pub level: ComprehensionLevel,
    /// Zero-based index of the current step.
    pub cursor: usize,
    /// Number of steps in the lesson.
    pub step_count: usize,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Number of state changes so far.
    pub revision: u64,
    /// The step at the cursor; `None` once terminated.
    pub current_step: Option<LearningStep>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

/// Result of processing one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    /// The command that was processed.
    pub command: Command,
    /// What it did.
    pub transition: Transition,
    /// The session after the command.
    pub session: SessionView,
}

/// Everything needed to regenerate the current step outside the session lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationTicket {
    /// Session identifier.
    pub session_id: Uuid,
    /// Revision the plan was made against.
    pub revision: u64,
    /// Cursor position to replace.
    pub cursor: usize,
    /// The lowered level.
    pub level: ComprehensionLevel,
    /// Subject.
    pub subject: Subject,
    /// Topic.
    pub topic: String,
    /// Title of the step being replaced.
    pub focus: String,
}

// ============================================================================
// Session
// ============================================================================

/// One learner's traversal through a generated lesson.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    subject: Subject,
    topic: String,
    level: ComprehensionLevel,
    steps: Vec<LearningStep>,
    cursor: usize,
    status: SessionStatus,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an active session positioned on the first step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopic` for a blank topic and `GenerationFailed` if
    /// `steps` is empty.
    pub fn new(
        subject: Subject,
        topic: impl Into<String>,
        level: ComprehensionLevel,
        steps: Vec<LearningStep>,
    ) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(StepwiseError::InvalidTopic);
        }
        if steps.is_empty() {
            return Err(StepwiseError::generation_failed(0, "lesson has no steps"));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            subject,
            topic: topic.trim().to_string(),
            level,
            steps,
            cursor: 0,
            status: SessionStatus::Active,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the subject.
    #[must_use]
    pub const fn subject(&self) -> Subject {
        self.subject
    }

    /// Returns the topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the current level.
    #[must_use]
    pub const fn level(&self) -> ComprehensionLevel {
        self.level
    }

    /// Returns the cursor.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the lesson steps.
    #[must_use]
    pub fn steps(&self) -> &[LearningStep] {
        &self.steps
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns the revision counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns `true` while the session accepts commands.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Returns the step at the cursor while active.
    #[must_use]
    pub fn current_step(&self) -> Option<&LearningStep> {
        if self.is_active() {
            self.steps.get(self.cursor)
        } else {
            None
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StepwiseError::SessionInactive { id: self.id })
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }

    /// Handles `next`.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` if the session has terminated.
    pub fn advance(&mut self) -> Result<Transition> {
        self.ensure_active()?;

        let transition = if self.cursor + 1 < self.steps.len() {
            self.cursor += 1;
            Transition::Advanced
        } else {
            self.status = SessionStatus::Terminated;
            Transition::Completed
        };
        self.bump();
        Ok(transition)
    }

    /// Handles `exit`.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` if the session has terminated.
    pub fn exit(&mut self) -> Result<Transition> {
        self.ensure_active()?;
        self.status = SessionStatus::Terminated;
        self.bump();
        Ok(Transition::Exited)
    }

    /// Plans a `simplify`.
    ///
    /// Returns `None` at the lowest level, where `simplify` changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` if the session has terminated.
    pub fn plan_simplify(&self) -> Result<Option<RegenerationTicket>> {
        self.ensure_active()?;

        let Some(level) = self.level.simplified() else {
            return Ok(None);
        };
        let focus = self
            .steps
            .get(self.cursor)
            .map(|s| s.title.clone())
            .unwrap_or_default();

        Ok(Some(RegenerationTicket {
            session_id: self.id,
            revision: self.revision,
            cursor: self.cursor,
            level,
            subject: self.subject,
            topic: self.topic.clone(),
            focus,
        }))
    }

    /// Installs a regenerated step planned by [`Session::plan_simplify`].
    ///
    /// The level change and the step replacement happen together.
    ///
    /// # Errors
    ///
    /// - `SessionInactive` if the session terminated meanwhile.
    /// - `SessionConflict` if any other command changed the session meanwhile.
    pub fn apply_regeneration(
        &mut self,
        ticket: &RegenerationTicket,
        step: LearningStep,
    ) -> Result<Transition> {
        self.ensure_active()?;
        if ticket.session_id != self.id || ticket.revision != self.revision {
            return Err(StepwiseError::SessionConflict { id: self.id });
        }
        let slot = self
            .steps
            .get_mut(ticket.cursor)
            .ok_or(StepwiseError::SessionConflict { id: self.id })?;

        *slot = step;
        self.level = ticket.level;
        self.bump();
        Ok(Transition::Simplified)
    }

    /// Returns a snapshot for callers.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            subject: self.subject,
            topic: self.topic.clone(),
            level: self.level,
            cursor: self.cursor,
            step_count: self.steps.len(),
            status: self.status,
            revision: self.revision,
            current_step: self.current_step().cloned(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
