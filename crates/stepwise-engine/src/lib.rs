//! Stepwise Engine
//!
//! Adaptive learning sessions: a five-question placement assessment yields a
//! comprehension level, and a session walks the learner through short,
//! validated learning steps generated at that level, re-leveling on demand.
//!
//! The `test-util` feature exposes the `fake` module, a scripted generation backend
//! for tests.

pub mod api;
pub mod assessment;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod generator;
pub mod level;
pub mod prompt;
pub mod retriever;
pub mod session;
pub mod step;
pub mod store;
pub mod subject;
pub mod validator;

pub use api::{
    create_router, AnswerRequest, AppState, CommandRequest, CreateSessionRequest, ErrorResponse,
    LevelRequest, LevelResponse,
};
pub use assessment::{AnswerProgress, Assessment, AssessmentView, QuestionView, QUESTION_BANK};
pub use client::{
    generate_within, GenerationClient, GenerationError, GenerationRequest, HttpGenerationClient,
    HARD_DEADLINE,
};
pub use config::{Config, GenerationConfig, RetrievalConfig, SessionConfig};
pub use engine::{LearningEngine, SweepReport};
pub use error::{ErrorCategory, ErrorKind, Result, StepwiseError};
pub use generator::{AttemptOutcome, ContentGenerator, GenerationPolicy, StepRequest};
pub use level::{calculate_level, ComprehensionLevel, MAX_LEVEL, MIN_LEVEL, REQUIRED_ANSWERS};
pub use retriever::{ContextRetriever, Passage, PassageRetriever, Retrieval};
pub use session::{Command, CommandOutcome, Session, SessionStatus, SessionView, Transition};
pub use step::LearningStep;
pub use store::{InMemoryLevelStore, InMemorySessionStore, LevelStore, SessionStore};
pub use subject::Subject;
pub use validator::{validate, RejectionReason, ValidationResult};
