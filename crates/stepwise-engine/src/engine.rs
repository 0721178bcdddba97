//! The engine facade: the operations a transport layer calls.
//!
//! [`LearningEngine`] owns the registries and the content generator. It never
//! holds a session lock across a generation call: state is read under the
//! lock, the lock is released for retrieval and generation, and it is
//! re-acquired only to apply the validated result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assessment::{AnswerProgress, Assessment, AssessmentView};
use crate::client::GenerationClient;
use crate::config::Config;
use crate::error::{Result, StepwiseError};
use crate::generator::{ContentGenerator, GenerationPolicy, StepRequest};
use crate::level::ComprehensionLevel;
use crate::retriever::Retrieval;
use crate::session::{Command, CommandOutcome, Session, SessionView, Transition};
use crate::store::{
    AssessmentRegistry, InMemoryLevelStore, InMemorySessionStore, LevelStore, SessionStore,
};
use crate::subject::Subject;

/// Counts from one idle sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions evicted.
    pub sessions: usize,
    /// Assessments evicted.
    pub assessments: usize,
}

/// Assessment, session, and generation orchestration.
pub struct LearningEngine {
    generator: ContentGenerator,
    retrieval: Retrieval,
    sessions: Arc<dyn SessionStore>,
    assessments: AssessmentRegistry,
    levels: Arc<dyn LevelStore>,
}

impl std::fmt::Debug for LearningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningEngine")
            .field("generator", &self.generator)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl LearningEngine {
    /// Creates an engine from its parts.
    #[must_use]
    pub fn new(
        generator: ContentGenerator,
        retrieval: Retrieval,
        sessions: Arc<dyn SessionStore>,
        levels: Arc<dyn LevelStore>,
        assessment_ttl: Duration,
    ) -> Self {
        Self {
            generator,
            retrieval,
            sessions,
            assessments: AssessmentRegistry::new(assessment_ttl),
            levels,
        }
    }

    /// Creates an engine with in-memory stores.
    #[must_use]
    pub fn in_memory(
        client: Arc<dyn GenerationClient>,
        policy: GenerationPolicy,
        retrieval: Retrieval,
        idle_ttl: Duration,
    ) -> Self {
        Self::new(
            ContentGenerator::new(client, policy),
            retrieval,
            Arc::new(InMemorySessionStore::new(idle_ttl)),
            Arc::new(InMemoryLevelStore::new()),
            idle_ttl,
        )
    }

    /// Creates an engine with in-memory stores, configured from `config`.
    #[must_use]
    pub fn from_config(
        config: &Config,
        client: Arc<dyn GenerationClient>,
        retrieval: Retrieval,
    ) -> Self {
        Self::in_memory(
            client,
            GenerationPolicy::from(&config.generation),
            retrieval,
            config.session.idle_ttl(),
        )
    }

    // ========================================================================
    // Assessments
    // ========================================================================

    /// Starts a new assessment.
    pub async fn start_assessment(&self) -> AssessmentView {
        let assessment = Assessment::new();
        let view = assessment.view();
        self.assessments.insert(assessment).await;
        info!(assessment_id = %view.id, "Assessment started");
        view
    }

    /// Records one answer.
    ///
    /// # Errors
    ///
    /// `AssessmentNotFound`, `QuestionNotFound`, `OptionNotFound`, or
    /// `DuplicateAnswer`.
    pub async fn submit_answer(
        &self,
        assessment_id: Uuid,
        question_id: &str,
        option_id: &str,
    ) -> Result<AnswerProgress> {
        let handle = self.assessments.get(assessment_id).await?;
        let progress = handle.lock().await.record_answer(question_id, option_id)?;
        debug!(
            %assessment_id,
            question_id,
            answered = progress.answered,
            "Answer recorded"
        );
        Ok(progress)
    }

    /// Computes the level for a completed assessment and discards it.
    ///
    /// When `learner` is given, the level is stored for that learner.
    ///
    /// # Errors
    ///
    /// `AssessmentNotFound`, `IncompleteAssessment`, or `InvalidInput` for a
    /// blank learner identity.
    pub async fn calculate_level(
        &self,
        assessment_id: Uuid,
        learner: Option<&str>,
    ) -> Result<ComprehensionLevel> {
        let learner = learner.map(normalize_learner).transpose()?;
        let handle = self.assessments.get(assessment_id).await?;
        let level = handle.lock().await.level()?;

        if let Some(learner) = learner {
            self.levels.save(learner, level).await?;
        }
        self.assessments.remove(assessment_id).await;

        info!(
            %assessment_id,
            level = level.value(),
            learner = learner.unwrap_or("-"),
            "Comprehension level calculated"
        );
        Ok(level)
    }

    /// Returns the level stored for a learner.
    ///
    /// # Errors
    ///
    /// `LearnerLevelNotFound` if none was recorded.
    pub async fn learner_level(&self, learner: &str) -> Result<ComprehensionLevel> {
        let learner = normalize_learner(learner)?;
        self.levels
            .load(learner)
            .await?
            .ok_or_else(|| StepwiseError::LearnerLevelNotFound {
                learner: learner.to_string(),
            })
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Creates a session and generates its lesson.
    ///
    /// # Errors
    ///
    /// `InvalidSubject`, `InvalidTopic`, `InvalidLevel`, or any generation error.
    pub async fn create_session(&self, subject: &str, topic: &str, level: i64) -> Result<SessionView> {
        let subject: Subject = subject.parse()?;
        if topic.trim().is_empty() {
            return Err(StepwiseError::InvalidTopic);
        }
        let level = ComprehensionLevel::try_from(level)?;
        self.start_session(subject, topic.trim(), level).await
    }

    /// Creates a session at the learner's stored level.
    ///
    /// # Errors
    ///
    /// As [`LearningEngine::create_session`], plus `LearnerLevelNotFound`.
    pub async fn create_session_for_learner(
        &self,
        subject: &str,
        topic: &str,
        learner: &str,
    ) -> Result<SessionView> {
        let subject: Subject = subject.parse()?;
        if topic.trim().is_empty() {
            return Err(StepwiseError::InvalidTopic);
        }
        let level = self.learner_level(learner).await?;
        self.start_session(subject, topic.trim(), level).await
    }

    async fn start_session(
        &self,
        subject: Subject,
        topic: &str,
        level: ComprehensionLevel,
    ) -> Result<SessionView> {
        let deadline = self.generator.deadline();
        let context = self.fetch_context(subject, topic, deadline).await;
        let steps = self
            .generator
            .generate_steps_by(deadline, subject, topic, level, context.as_deref())
            .await?;

        let session = Session::new(subject, topic, level, steps)?;
        let view = session.view();
        self.sessions.insert(session).await;

        info!(
            session_id = %view.id,
            %subject,
            topic,
            level = level.value(),
            steps = view.step_count,
            "Session created"
        );
        Ok(view)
    }

    /// Returns a snapshot of a session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for unknown or expired sessions.
    pub async fn session(&self, session_id: Uuid) -> Result<SessionView> {
        let handle = self.sessions.get(session_id).await?;
        let view = handle.lock().await.view();
        Ok(view)
    }

    /// Processes one learner command.
    ///
    /// # Errors
    ///
    /// - `InvalidCommand` for unknown commands.
    /// - `SessionNotFound` / `SessionInactive` for unknown or terminated sessions.
    /// - `SessionConflict` if a concurrent command won the race during `simplify`.
    /// - Generation errors from `simplify`; the session is left unchanged.
    pub async fn process_command(&self, session_id: Uuid, command: &str) -> Result<CommandOutcome> {
        let command: Command = command.parse()?;
        let handle = self.sessions.get(session_id).await?;

        let ticket = {
            let mut session = handle.lock().await;
            let transition = match command {
                Command::Next => Some(session.advance()?),
                Command::Exit => Some(session.exit()?),
                Command::Simplify => None,
            };

            if let Some(transition) = transition {
                info!(%session_id, %command, ?transition, cursor = session.cursor(), "Command processed");
                return Ok(CommandOutcome {
                    command,
                    transition,
                    session: session.view(),
                });
            }

            match session.plan_simplify()? {
                Some(ticket) => ticket,
                None => {
                    debug!(%session_id, "Simplify at lowest level; nothing to do");
                    return Ok(CommandOutcome {
                        command,
                        transition: Transition::Unchanged,
                        session: session.view(),
                    });
                }
            }
        };

        let deadline = self.generator.deadline();
        let context = self
            .fetch_context(ticket.subject, &ticket.topic, deadline)
            .await;
        let request = StepRequest {
            subject: ticket.subject,
            topic: &ticket.topic,
            level: ticket.level,
            step_index: ticket.cursor,
            focus: Some(&ticket.focus),
            context: context.as_deref(),
        };
        let step = self
            .generator
            .generate_single_step_by(deadline, &request)
            .await?;

        let mut session = handle.lock().await;
        let transition = session.apply_regeneration(&ticket, step).map_err(|e| {
            warn!(%session_id, error = %e, "Discarding regenerated step");
            e
        })?;

        info!(
            %session_id,
            %command,
            level = session.level().value(),
            cursor = session.cursor(),
            "Command processed"
        );
        Ok(CommandOutcome {
            command,
            transition,
            session: session.view(),
        })
    }

    /// Evicts idle sessions and assessments.
    pub async fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            sessions: self.sessions.evict_idle().await,
            assessments: self.assessments.evict_idle().await,
        };
        if report != SweepReport::default() {
            info!(
                sessions = report.sessions,
                assessments = report.assessments,
                "Evicted idle entries"
            );
        }
        report
    }

    /// Retrieves context within what is left of the operation budget.
    async fn fetch_context(
        &self,
        subject: Subject,
        topic: &str,
        deadline: Instant,
    ) -> Option<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.retrieval.fetch_within(subject, topic, remaining).await
    }
}

fn normalize_learner(learner: &str) -> Result<&str> {
    let learner = learner.trim();
    if learner.is_empty() {
        Err(StepwiseError::invalid_input("learner id must not be empty"))
    } else {
        Ok(learner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    use super::*;
    use crate::client::{GenerationError, HARD_DEADLINE};
    use crate::error::ErrorKind;
    use crate::fake::{lesson_json, scaffolded_body, step_json, Reply, ScriptedClient};
    use crate::retriever::ContextRetriever;
    use crate::session::SessionStatus;
    use crate::step::word_count;

    fn policy() -> GenerationPolicy {
        GenerationPolicy {
            call_timeout: Duration::from_millis(200),
            operation_budget: Duration::from_millis(500),
            ..GenerationPolicy::default()
        }
    }

    fn engine_with(client: Arc<ScriptedClient>) -> LearningEngine {
        LearningEngine::in_memory(client, policy(), Retrieval::Absent, Duration::from_secs(60))
    }

    /// Lesson first, then single steps for every later call.
    fn lesson_then_steps(count: usize) -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient::new(vec![
            Reply::text(lesson_json(count, 50)),
            Reply::text(step_json("Simpler", &scaffolded_body(45))),
        ]))
    }

    async fn answered_assessment(engine: &LearningEngine, options: [&str; 5]) -> Uuid {
        let view = engine.start_assessment().await;
        for (question, option) in view.questions.iter().zip(options) {
            engine
                .submit_answer(view.id, &question.id, option)
                .await
                .unwrap();
        }
        view.id
    }

    struct FixedRetriever;

    #[async_trait]
    impl ContextRetriever for FixedRetriever {
        async fn retrieve(&self, _: Subject, _: &str, _: usize) -> Result<Option<String>> {
            Ok(Some("Work is measured in joules.".to_string()))
        }
    }

    struct SlowRetriever(Duration);

    #[async_trait]
    impl ContextRetriever for SlowRetriever {
        async fn retrieve(&self, _: Subject, _: &str, _: usize) -> Result<Option<String>> {
            tokio::time::sleep(self.0).await;
            Ok(Some("Work is measured in joules.".to_string()))
        }
    }

    // ------------------------------------------------------------------------
    // Assessments
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_assessment_to_level() {
        let engine = engine_with(lesson_then_steps(3));
        let id = answered_assessment(&engine, ["a", "b", "b", "c", "d"]).await;

        let level = engine.calculate_level(id, Some("ada")).await.unwrap();
        assert_eq!(level.value(), 2);
        assert_eq!(engine.learner_level("ada").await.unwrap(), level);

        // The assessment is discarded once the level is computed.
        let err = engine.calculate_level(id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_incomplete_assessment_is_kept() {
        let engine = engine_with(lesson_then_steps(3));
        let view = engine.start_assessment().await;
        engine.submit_answer(view.id, "q1", "c").await.unwrap();

        let err = engine.calculate_level(view.id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteAssessment);

        let progress = engine.submit_answer(view.id, "q2", "c").await.unwrap();
        assert_eq!(progress.answered, 2);
    }

    #[tokio::test]
    async fn test_duplicate_answer_is_rejected() {
        let engine = engine_with(lesson_then_steps(3));
        let view = engine.start_assessment().await;
        engine.submit_answer(view.id, "q1", "a").await.unwrap();

        let err = engine.submit_answer(view.id, "q1", "b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateAnswer);
    }

    #[tokio::test]
    async fn test_unknown_assessment_and_learner() {
        let engine = engine_with(lesson_then_steps(3));
        let err = engine
            .submit_answer(Uuid::new_v4(), "q1", "a")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = engine.learner_level("nobody").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = engine.learner_level("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    // ------------------------------------------------------------------------
    // Session creation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_session_generates_lesson() {
        let engine = engine_with(lesson_then_steps(4));
        let view = engine.create_session("Physics", "Work", 2).await.unwrap();

        assert_eq!(view.step_count, 4);
        assert_eq!(view.cursor, 0);
        assert_eq!(view.status, SessionStatus::Active);
        let step = view.current_step.unwrap();
        assert!((40..=60).contains(&word_count(&step.body)));
    }

    #[tokio::test]
    async fn test_create_session_validates_input_before_generating() {
        let client = lesson_then_steps(3);
        let engine = engine_with(client.clone());

        let err = engine
            .create_session("Astrology", "Stars", 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubject);

        let err = engine.create_session("Physics", " ", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTopic);

        for level in [0, 5, -1] {
            let err = engine
                .create_session("Physics", "Work", level)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidLevel);
        }

        assert_eq!(client.calls().await, 0);
    }

    #[tokio::test]
    async fn test_create_session_for_learner_uses_stored_level() {
        let client = lesson_then_steps(3);
        let engine = engine_with(client.clone());
        let id = answered_assessment(&engine, ["d", "d", "c", "a", "d"]).await;
        engine.calculate_level(id, Some("grace")).await.unwrap();

        let view = engine
            .create_session_for_learner("Biology", "Cells", "grace")
            .await
            .unwrap();
        assert_eq!(view.level.value(), 4);
        assert!(client.prompts().await[0].contains("Comprehension level: 4 of 4"));

        let err = engine
            .create_session_for_learner("Biology", "Cells", "unknown")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_present_retrieval_reaches_the_prompt() {
        let client = lesson_then_steps(3);
        let engine = LearningEngine::in_memory(
            client.clone(),
            policy(),
            Retrieval::present(Arc::new(FixedRetriever), 2),
            Duration::from_secs(60),
        );
        let view = engine.create_session("Physics", "Work", 3).await.unwrap();
        engine.process_command(view.id, "simplify").await.unwrap();

        let prompts = client.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts
            .iter()
            .all(|p| p.contains("Work is measured in joules.")));
    }

    #[tokio::test]
    async fn test_generation_failure_creates_no_session() {
        let client = Arc::new(ScriptedClient::new(vec![Reply::fail(
            GenerationError::unavailable("connection refused"),
        )]));
        let engine = engine_with(client);

        let err = engine.create_session("Physics", "Work", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationUnavailable);
        assert_eq!(engine.sessions.count().await, 0);
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_next_until_completion_then_inactive() {
        let engine = engine_with(lesson_then_steps(4));
        let id = engine.create_session("Physics", "Work", 3).await.unwrap().id;

        for expected in 1..4 {
            let outcome = engine.process_command(id, "next").await.unwrap();
            assert_eq!(outcome.transition, Transition::Advanced);
            assert_eq!(outcome.session.cursor, expected);
        }

        let outcome = engine.process_command(id, "next").await.unwrap();
        assert_eq!(outcome.transition, Transition::Completed);
        assert_eq!(outcome.session.status, SessionStatus::Terminated);
        assert!(outcome.session.current_step.is_none());

        let err = engine.process_command(id, "next").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionInactive);
    }

    #[tokio::test]
    async fn test_simplify_regenerates_current_step() {
        let client = lesson_then_steps(3);
        let engine = engine_with(client.clone());
        let created = engine.create_session("Physics", "Work", 3).await.unwrap();
        let before = created.current_step.unwrap();

        let outcome = engine.process_command(created.id, "simplify").await.unwrap();

        assert_eq!(outcome.transition, Transition::Simplified);
        assert_eq!(outcome.session.level.value(), 2);
        assert_eq!(outcome.session.cursor, 0);
        assert_eq!(outcome.session.step_count, 3);
        let after = outcome.session.current_step.unwrap();
        assert_ne!(after.id, before.id);
        assert_eq!(after.title, "Simpler");

        let prompt = &client.prompts().await[1];
        assert!(prompt.contains("Comprehension level: 2 of 4"));
        assert!(prompt.contains(&before.title));
    }

    #[tokio::test]
    async fn test_simplify_never_goes_below_one() {
        let client = lesson_then_steps(3);
        let engine = engine_with(client.clone());
        let id = engine.create_session("History", "Rome", 4).await.unwrap().id;

        let mut last = None;
        for _ in 0..5 {
            last = Some(engine.process_command(id, "simplify").await.unwrap());
        }

        let last = last.unwrap();
        assert_eq!(last.transition, Transition::Unchanged);
        assert_eq!(last.session.level.value(), 1);
        // One lesson call plus three regenerations (4 -> 3 -> 2 -> 1).
        assert_eq!(client.calls().await, 4);
    }

    #[tokio::test]
    async fn test_simplify_at_level_one_is_a_no_op() {
        let client = lesson_then_steps(3);
        let engine = engine_with(client.clone());
        let created = engine.create_session("Physics", "Work", 1).await.unwrap();

        let outcome = engine.process_command(created.id, "simplify").await.unwrap();

        assert_eq!(outcome.transition, Transition::Unchanged);
        assert_eq!(outcome.session.level.value(), 1);
        assert_eq!(outcome.session.current_step, created.current_step);
        assert_eq!(client.calls().await, 1);
    }

    #[tokio::test]
    async fn test_failed_regeneration_leaves_session_unchanged() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::text(lesson_json(3, 50)),
            Reply::fail(GenerationError::unavailable("connection refused")),
        ]));
        let engine = engine_with(client);
        let created = engine.create_session("Physics", "Work", 3).await.unwrap();

        let err = engine
            .process_command(created.id, "simplify")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationUnavailable);

        let view = engine.session(created.id).await.unwrap();
        assert_eq!(view.level.value(), 3);
        assert_eq!(view.current_step, created.current_step);
        assert_eq!(view.revision, 0);
    }

    #[tokio::test]
    async fn test_simplify_with_slow_retrieval_stays_within_deadline() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::text(lesson_json(3, 50)),
            Reply::delayed(Duration::from_secs(10), step_json("Late", &scaffolded_body(45))),
        ]));
        let engine = LearningEngine::in_memory(
            client,
            GenerationPolicy::default(),
            Retrieval::present(Arc::new(SlowRetriever(Duration::from_millis(480))), 2),
            Duration::from_secs(60),
        );
        let id = engine.create_session("Physics", "Work", 3).await.unwrap().id;

        let started = Instant::now();
        let err = engine.process_command(id, "simplify").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GenerationTimeout);
        assert!(started.elapsed() < HARD_DEADLINE + Duration::from_millis(250));
        assert_eq!(engine.session(id).await.unwrap().level.value(), 3);
    }

    #[tokio::test]
    async fn test_create_session_with_slow_retrieval_stays_within_deadline() {
        let client = Arc::new(ScriptedClient::always_delayed(Duration::from_secs(10)));
        let engine = LearningEngine::in_memory(
            client,
            GenerationPolicy::default(),
            Retrieval::present(Arc::new(SlowRetriever(Duration::from_millis(480))), 2),
            Duration::from_secs(60),
        );

        let started = Instant::now();
        let err = engine.create_session("Physics", "Work", 2).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GenerationTimeout);
        assert!(started.elapsed() < HARD_DEADLINE + Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_command_racing_simplify_causes_conflict() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::text(lesson_json(4, 50)),
            Reply::delayed(
                Duration::from_millis(100),
                step_json("Slow", &scaffolded_body(45)),
            ),
        ]));
        let engine = Arc::new(engine_with(client));
        let id = engine.create_session("Physics", "Work", 3).await.unwrap().id;

        let simplify = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.process_command(id, "simplify").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let next = engine.process_command(id, "next").await.unwrap();
        assert_eq!(next.transition, Transition::Advanced);

        let err = simplify.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionConflict);

        let view = engine.session(id).await.unwrap();
        assert_eq!(view.level.value(), 3);
        assert_eq!(view.cursor, 1);
    }

    #[tokio::test]
    async fn test_exit_then_any_command_is_inactive() {
        let engine = engine_with(lesson_then_steps(5));
        let id = engine.create_session("Physics", "Work", 2).await.unwrap().id;

        let outcome = engine.process_command(id, "EXIT").await.unwrap();
        assert_eq!(outcome.transition, Transition::Exited);

        for command in ["next", "simplify", "exit"] {
            let err = engine.process_command(id, command).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SessionInactive);
        }
        // Terminated sessions stay visible until they expire.
        assert_ok!(engine.session(id).await);
    }

    #[tokio::test]
    async fn test_unknown_session_and_command() {
        let engine = engine_with(lesson_then_steps(3));
        let err = engine
            .process_command(Uuid::new_v4(), "next")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);

        let id = engine.create_session("Physics", "Work", 2).await.unwrap().id;
        let err = engine.process_command(id, "jump").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_entries() {
        let engine = LearningEngine::in_memory(
            lesson_then_steps(3),
            policy(),
            Retrieval::Absent,
            Duration::from_millis(50),
        );
        let id = engine.create_session("Physics", "Work", 2).await.unwrap().id;
        engine.start_assessment().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = engine.sweep().await;

        assert_eq!(
            report,
            SweepReport {
                sessions: 1,
                assessments: 1
            }
        );
        let err = engine.session(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }
}
