//! Content generation: prompt, call, parse, validate, retry.
//!
//! The generator is stateless. Each operation runs an explicit bounded loop
//! where every attempt ends in one typed [`AttemptOutcome`]:
//!
//! - `Accepted` returns immediately.
//! - `Rejected` (validation or parse failure) retries with a prompt that
//!   restates the violated constraint, up to `max_attempts` in total.
//! - `BackendError` (timeout or unreachable backend) is retried at most
//!   `backend_retries` times before it is surfaced.
//!
//! When every attempt was rejected for word count only, the last candidate is
//! accepted with its offending steps flagged as degraded. Structural
//! violations are never accepted.
//!
//! Each operation runs against one deadline. Callers that do work before
//! generating (context retrieval) take a deadline from
//! [`ContentGenerator::deadline`] first and pass it to the `_by` variants, so
//! that work counts against the same budget. Running out of budget before the
//! attempts are used up is reported as a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{
    generate_within, GenerationClient, GenerationError, GenerationRequest, HARD_DEADLINE,
};
use crate::config::GenerationConfig;
use crate::error::{Result, StepwiseError};
use crate::level::ComprehensionLevel;
use crate::prompt::{build_lesson_prompt, build_step_prompt, tighten};
use crate::step::{LearningStep, MAX_LESSON_STEPS, MIN_LESSON_STEPS};
use crate::subject::Subject;
use crate::validator::{validate, RejectionReason, ValidationResult};

/// Limits applied to every generation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationPolicy {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Extra attempts allowed after a timeout or unreachable backend.
    pub backend_retries: u32,
    /// Deadline for a single backend call.
    pub call_timeout: Duration,
    /// Time budget for one whole operation, from its start to its result.
    pub operation_budget: Duration,
    /// Upper bound on generated output size, in tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backend_retries: 1,
            call_timeout: Duration::from_secs(2),
            operation_budget: HARD_DEADLINE,
            max_output_tokens: 600,
        }
    }
}

impl From<&GenerationConfig> for GenerationPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backend_retries: config.backend_retries,
            call_timeout: config.call_timeout(),
            operation_budget: HARD_DEADLINE,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Result of one generation attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// The content passed validation.
    Accepted(T),
    /// The content was rejected. `candidate` holds degraded content when
    /// the only violation was word count.
    Rejected {
        /// Why the content was rejected.
        reason: RejectionReason,
        /// Content acceptable in degraded form, if any.
        candidate: Option<T>,
    },
    /// The backend timed out or could not be reached.
    BackendError(GenerationError),
}

/// Parameters for regenerating one step of a lesson.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    /// Lesson subject.
    pub subject: Subject,
    /// Lesson topic.
    pub topic: &'a str,
    /// Level to write the step at.
    pub level: ComprehensionLevel,
    /// Zero-based position of the step in the lesson.
    pub step_index: usize,
    /// Title of the step being replaced, if any.
    pub focus: Option<&'a str>,
    /// Retrieved textbook context, if any.
    pub context: Option<&'a str>,
}

/// Produces validated learning steps from a generation backend.
#[derive(Clone)]
pub struct ContentGenerator {
    client: Arc<dyn GenerationClient>,
    policy: GenerationPolicy,
}

impl std::fmt::Debug for ContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGenerator")
            .field("client", &self.client.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ContentGenerator {
    /// Creates a generator over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn GenerationClient>, policy: GenerationPolicy) -> Self {
        Self { client, policy }
    }

    /// Returns the policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Returns the deadline for an operation starting now.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.policy.operation_budget
    }

    /// Generates a lesson of 3 to 5 steps.
    ///
    /// # Errors
    ///
    /// - `GenerationFailed` if the attempts were used up on invalid content.
    /// - `GenerationTimeout` if the budget ran out first or the backend kept
    ///   timing out.
    /// - `GenerationUnavailable` if the backend kept failing.
    pub async fn generate_steps(
        &self,
        subject: Subject,
        topic: &str,
        level: ComprehensionLevel,
        context: Option<&str>,
    ) -> Result<Vec<LearningStep>> {
        self.generate_steps_by(self.deadline(), subject, topic, level, context)
            .await
    }

    /// Generates a lesson of 3 to 5 steps, finishing by `deadline`.
    ///
    /// # Errors
    ///
    /// Same as [`ContentGenerator::generate_steps`].
    pub async fn generate_steps_by(
        &self,
        deadline: Instant,
        subject: Subject,
        topic: &str,
        level: ComprehensionLevel,
        context: Option<&str>,
    ) -> Result<Vec<LearningStep>> {
        let prompt = build_lesson_prompt(subject, topic, level, context);

        let steps = self
            .run_attempts("lesson", &prompt, deadline, |text| evaluate_lesson(&text))
            .await?;

        info!(
            %subject,
            topic,
            level = level.value(),
            steps = steps.len(),
            degraded = steps.iter().filter(|s| s.degraded).count(),
            "Generated lesson"
        );
        Ok(steps)
    }

    /// Generates one replacement step.
    ///
    /// # Errors
    ///
    /// Same as [`ContentGenerator::generate_steps`].
    pub async fn generate_single_step(&self, request: &StepRequest<'_>) -> Result<LearningStep> {
        self.generate_single_step_by(self.deadline(), request).await
    }

    /// Generates one replacement step, finishing by `deadline`.
    ///
    /// # Errors
    ///
    /// Same as [`ContentGenerator::generate_steps`].
    pub async fn generate_single_step_by(
        &self,
        deadline: Instant,
        request: &StepRequest<'_>,
    ) -> Result<LearningStep> {
        let prompt = build_step_prompt(
            request.subject,
            request.topic,
            request.level,
            request.step_index,
            request.focus,
            request.context,
        );

        let step = self
            .run_attempts("step", &prompt, deadline, |text| {
                evaluate_single(&text)
            })
            .await?;

        info!(
            subject = %request.subject,
            topic = request.topic,
            level = request.level.value(),
            step_index = request.step_index,
            degraded = step.degraded,
            "Generated step"
        );
        Ok(step)
    }

    async fn run_attempts<T>(
        &self,
        operation: &'static str,
        base_prompt: &str,
        deadline: Instant,
        evaluate: impl Fn(String) -> AttemptOutcome<T> + Send,
    ) -> Result<T> {
        let started = Instant::now();
        let mut prompt = base_prompt.to_string();
        let mut attempts = 0u32;
        let mut backend_failures = 0u32;
        let mut last: Option<AttemptOutcome<T>> = None;
        // Degraded acceptance needs every attempt to be a soft rejection.
        let mut all_soft = true;
        let mut out_of_budget = false;

        while attempts < self.policy.max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(operation, attempts, "Generation budget exhausted");
                out_of_budget = true;
                break;
            }
            attempts += 1;

            let request = GenerationRequest::new(
                prompt.clone(),
                self.policy.max_output_tokens,
                remaining.min(self.policy.call_timeout),
            );
            let outcome = match generate_within(self.client.as_ref(), &request).await {
                Ok(text) => evaluate(text),
                Err(GenerationError::MalformedOutput { message }) => AttemptOutcome::Rejected {
                    reason: RejectionReason::MalformedOutput { message },
                    candidate: None,
                },
                Err(error) => AttemptOutcome::BackendError(error),
            };

            match outcome {
                AttemptOutcome::Accepted(value) => {
                    debug!(
                        operation,
                        attempt = attempts,
                        elapsed_ms = started.elapsed().as_millis(),
                        "Generated content accepted"
                    );
                    return Ok(value);
                }
                AttemptOutcome::Rejected { reason, candidate } => {
                    warn!(operation, attempt = attempts, %reason, "Generated content rejected");
                    prompt = tighten(base_prompt, &reason);
                    all_soft &= reason.is_soft() && candidate.is_some();
                    last = Some(AttemptOutcome::Rejected { reason, candidate });
                }
                AttemptOutcome::BackendError(error) => {
                    backend_failures += 1;
                    all_soft = false;
                    warn!(operation, attempt = attempts, %error, "Generation backend failed");
                    last = Some(AttemptOutcome::BackendError(error));
                    if backend_failures > self.policy.backend_retries {
                        break;
                    }
                }
            }
        }

        let all_attempts_used = attempts == self.policy.max_attempts;
        match last {
            Some(AttemptOutcome::Accepted(value)) => Ok(value),
            Some(AttemptOutcome::Rejected {
                reason,
                candidate: Some(value),
            }) if all_soft && all_attempts_used => {
                warn!(
                    operation,
                    attempts,
                    %reason,
                    "Accepting degraded content after exhausting retries"
                );
                Ok(value)
            }
            Some(AttemptOutcome::BackendError(error)) => Err(error.into()),
            Some(AttemptOutcome::Rejected { reason, .. }) if !out_of_budget => {
                Err(StepwiseError::generation_failed(attempts, reason))
            }
            Some(AttemptOutcome::Rejected { reason, .. }) => {
                warn!(
                    operation,
                    attempts,
                    %reason,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Budget ran out before a valid result"
                );
                Err(GenerationError::timeout(self.policy.operation_budget).into())
            }
            None => Err(GenerationError::timeout(self.policy.operation_budget).into()),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BodyField {
    Text(String),
    Lines(Vec<String>),
}

impl Default for BodyField {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: BodyField,
}

impl RawStep {
    fn into_step(self) -> LearningStep {
        let body = match self.body {
            BodyField::Text(text) => text,
            BodyField::Lines(lines) => lines.join("\n"),
        };
        LearningStep::new(self.title.trim(), body.trim())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOutput {
    Lesson { steps: Vec<RawStep> },
    List(Vec<RawStep>),
    Single(RawStep),
}

impl RawOutput {
    fn into_steps(self) -> Vec<RawStep> {
        match self {
            Self::Lesson { steps } | Self::List(steps) => steps,
            Self::Single(step) => vec![step],
        }
    }
}

/// Reads the first JSON value in generated text that has the shape of step
/// data. Code fences and chatter before or after the value are ignored.
fn first_json_value(text: &str) -> std::result::Result<RawOutput, String> {
    let mut first_error = None;
    for (start, _) in text.match_indices(['{', '[']) {
        let mut values =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<RawOutput>();
        match values.next() {
            Some(Ok(output)) => return Ok(output),
            Some(Err(e)) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
            None => {}
        }
    }
    Err(first_error.unwrap_or_else(|| "no JSON object found".to_string()))
}

fn parse_output(text: &str) -> std::result::Result<Vec<RawStep>, RejectionReason> {
    first_json_value(text)
        .map(RawOutput::into_steps)
        .map_err(|message| RejectionReason::MalformedOutput { message })
}

fn evaluate_lesson(text: &str) -> AttemptOutcome<Vec<LearningStep>> {
    let raw = match parse_output(text) {
        Ok(raw) => raw,
        Err(reason) => {
            return AttemptOutcome::Rejected {
                reason,
                candidate: None,
            }
        }
    };

    if raw.len() < MIN_LESSON_STEPS {
        return AttemptOutcome::Rejected {
            reason: RejectionReason::StepCount { found: raw.len() },
            candidate: None,
        };
    }
    if raw.len() > MAX_LESSON_STEPS {
        debug!(
            found = raw.len(),
            kept = MAX_LESSON_STEPS,
            "Truncating oversized lesson"
        );
    }

    let mut soft_reason = None;
    let mut steps = Vec::with_capacity(MAX_LESSON_STEPS);
    for step in raw.into_iter().take(MAX_LESSON_STEPS).map(RawStep::into_step) {
        match validate(&step) {
            ValidationResult::Accepted => steps.push(step),
            ValidationResult::Rejected(reason) if reason.is_soft() => {
                soft_reason.get_or_insert(reason);
                steps.push(step.into_degraded());
            }
            ValidationResult::Rejected(reason) => {
                return AttemptOutcome::Rejected {
                    reason,
                    candidate: None,
                }
            }
        }
    }

    match soft_reason {
        None => AttemptOutcome::Accepted(steps),
        Some(reason) => AttemptOutcome::Rejected {
            reason,
            candidate: Some(steps),
        },
    }
}

fn evaluate_single(text: &str) -> AttemptOutcome<LearningStep> {
    let step = match parse_output(text).map(|raw| raw.into_iter().next()) {
        Ok(Some(raw)) => raw.into_step(),
        Ok(None) => {
            return AttemptOutcome::Rejected {
                reason: RejectionReason::StepCount { found: 0 },
                candidate: None,
            }
        }
        Err(reason) => {
            return AttemptOutcome::Rejected {
                reason,
                candidate: None,
            }
        }
    };

    match validate(&step) {
        ValidationResult::Accepted => AttemptOutcome::Accepted(step),
        ValidationResult::Rejected(reason) if reason.is_soft() => AttemptOutcome::Rejected {
            reason,
            candidate: Some(step.into_degraded()),
        },
        ValidationResult::Rejected(reason) => AttemptOutcome::Rejected {
            reason,
            candidate: None,
        },
    }
}
