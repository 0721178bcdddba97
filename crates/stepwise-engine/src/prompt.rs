//! Prompt construction for the generation backend.
//!
//! Every function here is pure: the same inputs always produce the same
//! prompt text, with no I/O. Retrieved context is appended verbatim.

use std::fmt::Write as _;

use crate::level::ComprehensionLevel;
use crate::step::{MAX_BODY_WORDS, MAX_LESSON_STEPS, MIN_BODY_WORDS, MIN_LESSON_STEPS};
use crate::subject::Subject;
use crate::validator::RejectionReason;

const PREAMBLE: &str = "You are an expert teacher adapting textbook material for one learner. \
Explain the topic in short learning steps. Each step covers exactly one concept.";

const SCAFFOLDING_DIRECTIVE: &str = "Structure every step body visually: use bullet points (\"- \"), \
numbered items (\"1. \"), or line breaks between short sentences.";

/// Builds the prompt for a full lesson of 3 to 5 steps.
///
/// # Examples
///
/// ```
/// use stepwise_engine::prompt::build_lesson_prompt;
/// use stepwise_engine::{ComprehensionLevel, Subject};
///
/// let level = ComprehensionLevel::new(2).unwrap();
/// let prompt = build_lesson_prompt(Subject::Physics, "Work", level, None);
/// assert!(prompt.contains("Subject: Physics"));
/// assert!(prompt.contains("Topic: Work"));
/// ```
#[must_use]
pub fn build_lesson_prompt(
    subject: Subject,
    topic: &str,
    level: ComprehensionLevel,
    context: Option<&str>,
) -> String {
    let mut prompt = header(subject, topic, level);
    let _ = writeln!(
        prompt,
        "Write between {MIN_LESSON_STEPS} and {MAX_LESSON_STEPS} learning steps that build on each other."
    );
    push_constraints(&mut prompt);
    push_context(&mut prompt, context);
    prompt.push_str(
        "Respond with JSON only, in exactly this shape: \
{\"steps\": [{\"title\": \"...\", \"body\": \"...\"}]}",
    );
    prompt
}

/// Builds the prompt for a single replacement step.
///
/// `step_index` is zero-based; `focus` names the concept the replaced step
/// covered, so the new step explains the same idea at the new level.
#[must_use]
pub fn build_step_prompt(
    subject: Subject,
    topic: &str,
    level: ComprehensionLevel,
    step_index: usize,
    focus: Option<&str>,
    context: Option<&str>,
) -> String {
    let mut prompt = header(subject, topic, level);
    let _ = writeln!(
        prompt,
        "Write learning step number {} of the lesson.",
        step_index + 1
    );
    if let Some(focus) = focus.map(str::trim).filter(|f| !f.is_empty()) {
        let _ = writeln!(prompt, "The step must explain this concept: {focus}");
    }
    push_constraints(&mut prompt);
    push_context(&mut prompt, context);
    prompt.push_str(
        "Respond with JSON only, in exactly this shape: {\"title\": \"...\", \"body\": \"...\"}",
    );
    prompt
}

/// Returns `prompt` with the violated constraint restated at the end.
#[must_use]
pub fn tighten(prompt: &str, reason: &RejectionReason) -> String {
    format!(
        "{prompt}\n\nIMPORTANT: your previous answer was rejected ({reason}). {}",
        reason.restatement()
    )
}

fn header(subject: Subject, topic: &str, level: ComprehensionLevel) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{PREAMBLE}");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Subject: {subject}");
    let _ = writeln!(prompt, "Topic: {}", topic.trim());
    let _ = writeln!(
        prompt,
        "Comprehension level: {level} of 4 ({})",
        level.label()
    );
    let _ = writeln!(prompt, "Language: {}", level.directive());
    prompt
}

fn push_constraints(prompt: &mut String) {
    let _ = writeln!(
        prompt,
        "Each step needs a short title and a body of {MIN_BODY_WORDS} to {MAX_BODY_WORDS} words."
    );
    let _ = writeln!(prompt, "{SCAFFOLDING_DIRECTIVE}");
}

fn push_context(prompt: &mut String, context: Option<&str>) {
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        let _ = writeln!(prompt);
        let _ = writeln!(
            prompt,
            "Reference material from the textbook (use it where relevant):"
        );
        let _ = writeln!(prompt, "{context}");
    }
    let _ = writeln!(prompt);
}
