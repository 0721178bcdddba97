//! Placement assessment: five graded questions that yield a comprehension level.
//!
//! The question bank is fixed. Each question has four options, and every
//! option carries a hidden complexity grade in `[1, 4]`. Learners see only
//! identifiers and text; grades never leave the engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StepwiseError};
use crate::level::{calculate_level, ComprehensionLevel, REQUIRED_ANSWERS};

/// One answer option with its hidden complexity grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOption {
    /// Option identifier, `a` to `d`.
    pub id: &'static str,
    /// Text shown to the learner.
    pub text: &'static str,
    /// Complexity grade in `[1, 4]`.
    pub complexity: u8,
}

/// One assessment question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    /// Question identifier, `q1` to `q5`.
    pub id: &'static str,
    /// Text shown to the learner.
    pub prompt: &'static str,
    /// Exactly four graded options.
    pub options: [AnswerOption; 4],
}

impl Question {
    fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options
            .iter()
            .find(|o| o.id.eq_ignore_ascii_case(option_id.trim()))
    }
}

const fn option(id: &'static str, text: &'static str, complexity: u8) -> AnswerOption {
    AnswerOption {
        id,
        text,
        complexity,
    }
}

/// The built-in question bank, in presentation order.
pub static QUESTION_BANK: [Question; REQUIRED_ANSWERS] = [
    Question {
        id: "q1",
        prompt: "Which explanation of why ice floats would you find easiest to follow?",
        options: [
            option("a", "Ice is lighter than water, so it stays on top.", 1),
            option("b", "Frozen water takes up more space, so each cup of ice weighs less than a cup of water.", 2),
            option("c", "Ice has a lower density than liquid water because its molecules form an open lattice.", 3),
            option("d", "Hydrogen bonding fixes water molecules in a hexagonal lattice whose density is about nine percent below that of the liquid.", 4),
        ],
    },
    Question {
        id: "q2",
        prompt: "A textbook paragraph uses a word you do not know. What do you usually do?",
        options: [
            option("a", "Stop reading and ask someone what it means.", 1),
            option("b", "Look the word up before going on.", 2),
            option("c", "Guess the meaning from the rest of the sentence and check later.", 3),
            option("d", "Work it out from its roots and from how the author uses it elsewhere.", 4),
        ],
    },
    Question {
        id: "q3",
        prompt: "Which summary of photosynthesis matches how you would explain it to a classmate?",
        options: [
            option("a", "Plants use sunlight to make food.", 1),
            option("b", "Plants take in light, water and air and turn them into sugar and oxygen.", 2),
            option("c", "Chlorophyll captures light energy to convert carbon dioxide and water into glucose, releasing oxygen.", 3),
            option("d", "Light-dependent reactions produce ATP and NADPH that drive carbon fixation in the Calvin cycle.", 4),
        ],
    },
    Question {
        id: "q4",
        prompt: "How comfortable are you reading graphs and formulas in a lesson?",
        options: [
            option("a", "I prefer explanations without them.", 1),
            option("b", "I can read simple bar charts and tables.", 2),
            option("c", "I can follow line graphs and short formulas.", 3),
            option("d", "I can rearrange formulas and interpret several variables at once.", 4),
        ],
    },
    Question {
        id: "q5",
        prompt: "Which sentence best describes what a historical cause is?",
        options: [
            option("a", "Something that happened before something else.", 1),
            option("b", "A reason why an event happened.", 2),
            option("c", "A condition or action that made an event more likely, alongside other factors.", 3),
            option("d", "A factor whose significance historians weigh against others when building an explanation.", 4),
        ],
    },
];

fn find_question(question_id: &str) -> Option<&'static Question> {
    QUESTION_BANK
        .iter()
        .find(|q| q.id.eq_ignore_ascii_case(question_id.trim()))
}

// ============================================================================
// Public views
// ============================================================================

/// An option as shown to the learner (no grade).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    /// Option identifier.
    pub id: String,
    /// Option text.
    pub text: String,
}

/// A question as shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Question identifier.
    pub id: String,
    /// Question text.
    pub prompt: String,
    /// The four options.
    pub options: Vec<OptionView>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.to_string(),
            prompt: question.prompt.to_string(),
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id.to_string(),
                    text: o.text.to_string(),
                })
                .collect(),
        }
    }
}

/// A freshly started assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentView {
    /// Assessment identifier.
    pub id: Uuid,
    /// The questions to answer.
    pub questions: Vec<QuestionView>,
}

/// Progress after an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerProgress {
    /// Number of questions answered.
    pub answered: usize,
    /// Number of questions still open.
    pub remaining: usize,
    /// Whether a level can now be calculated.
    pub complete: bool,
}

// ============================================================================
// Assessment
// ============================================================================

/// One learner's in-progress assessment.
#[derive(Debug, Clone)]
pub struct Assessment {
    id: Uuid,
    answers: HashMap<&'static str, u8>,
    created_at: DateTime<Utc>,
}

impl Default for Assessment {
    fn default() -> Self {
        Self::new()
    }
}

impl Assessment {
    /// Starts an assessment with no answers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            answers: HashMap::with_capacity(REQUIRED_ANSWERS),
            created_at: Utc::now(),
        }
    }

    /// Returns the assessment identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the assessment was started.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the learner-facing view.
    #[must_use]
    pub fn view(&self) -> AssessmentView {
        AssessmentView {
            id: self.id,
            questions: QUESTION_BANK.iter().map(QuestionView::from).collect(),
        }
    }

    /// Records the chosen option for a question.
    ///
    /// The first answer to a question is final.
    ///
    /// # Errors
    ///
    /// - `QuestionNotFound` / `OptionNotFound` for unknown identifiers.
    /// - `DuplicateAnswer` if the question was already answered.
    pub fn record_answer(&mut self, question_id: &str, option_id: &str) -> Result<AnswerProgress> {
        let question =
            find_question(question_id).ok_or_else(|| StepwiseError::question_not_found(question_id))?;
        let chosen = question
            .option(option_id)
            .ok_or_else(|| StepwiseError::option_not_found(question.id, option_id))?;

        if self.answers.contains_key(question.id) {
            return Err(StepwiseError::duplicate_answer(question.id));
        }
        self.answers.insert(question.id, chosen.complexity);

        Ok(self.progress())
    }

    /// Returns answering progress.
    #[must_use]
    pub fn progress(&self) -> AnswerProgress {
        let answered = self.answers.len();
        AnswerProgress {
            answered,
            remaining: REQUIRED_ANSWERS.saturating_sub(answered),
            complete: answered == REQUIRED_ANSWERS,
        }
    }

    /// Returns the graded complexities in question-bank order.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteAssessment` until every question is answered.
    pub fn complexities(&self) -> Result<Vec<u8>> {
        let grades: Vec<u8> = QUESTION_BANK
            .iter()
            .filter_map(|q| self.answers.get(q.id).copied())
            .collect();

        if grades.len() == REQUIRED_ANSWERS {
            Ok(grades)
        } else {
            Err(StepwiseError::IncompleteAssessment {
                answered: grades.len(),
                required: REQUIRED_ANSWERS,
            })
        }
    }

    /// Computes the comprehension level from the recorded answers.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteAssessment` until every question is answered.
    pub fn level(&self) -> Result<ComprehensionLevel> {
        calculate_level(&self.complexities()?)
    }
}
