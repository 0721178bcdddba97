//! End-to-end tests for the learning flow.
//!
//! These tests drive the engine the way the HTTP layer does: assessment,
//! level calculation, session creation, and command processing, with a
//! scripted generation backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use stepwise_engine::fake::{lesson_json, scaffolded_body, step_json, Reply, ScriptedClient};
use stepwise_engine::step::word_count;
use stepwise_engine::{
    calculate_level, generate_within, validate, ComprehensionLevel, ContentGenerator, ErrorKind,
    GenerationError, GenerationPolicy, GenerationRequest, LearningEngine, Retrieval,
    SessionStatus, Subject, Transition, HARD_DEADLINE,
};

fn policy() -> GenerationPolicy {
    GenerationPolicy {
        call_timeout: Duration::from_millis(300),
        operation_budget: Duration::from_millis(600),
        ..GenerationPolicy::default()
    }
}

fn engine(client: ScriptedClient) -> LearningEngine {
    LearningEngine::in_memory(
        Arc::new(client),
        policy(),
        Retrieval::Absent,
        Duration::from_secs(3600),
    )
}

fn lesson_then_steps(count: usize) -> ScriptedClient {
    ScriptedClient::new(vec![
        Reply::text(lesson_json(count, 50)),
        Reply::text(step_json("A simpler view", &scaffolded_body(44))),
    ])
}

// ============================================================================
// Level aggregation
// ============================================================================

#[test]
fn test_level_is_sorted_middle_element() {
    let level = calculate_level(&[1, 4, 2, 3, 4]).expect("valid grades");
    assert_eq!(level.value(), 3);
}

#[tokio::test]
async fn test_answers_yield_level_two() {
    let engine = engine(lesson_then_steps(3));
    let assessment = engine.start_assessment().await;

    // Options a-d carry grades 1-4 for every question.
    for (question, option) in assessment.questions.iter().zip(["a", "b", "b", "c", "d"]) {
        engine
            .submit_answer(assessment.id, &question.id, option)
            .await
            .expect("answer accepted");
    }

    let level = engine
        .calculate_level(assessment.id, Some("learner-1"))
        .await
        .expect("level");
    assert_eq!(level.value(), 2);
    assert_eq!(
        engine.learner_level("learner-1").await.expect("stored"),
        level
    );
}

// ============================================================================
// Session scenarios
// ============================================================================

#[tokio::test]
async fn test_physics_work_lesson_has_valid_steps() {
    let engine = engine(lesson_then_steps(4));
    let view = engine
        .create_session("Physics", "Work", 2)
        .await
        .expect("session created");

    assert!((3..=5).contains(&view.step_count));
    let step = view.current_step.expect("current step");
    assert!((40..=60).contains(&word_count(&step.body)));
    assert!(validate(&step).is_accepted());
}

#[tokio::test]
async fn test_next_from_last_step_terminates() {
    let engine = engine(lesson_then_steps(4));
    let id = engine
        .create_session("Physics", "Work", 3)
        .await
        .expect("session created")
        .id;

    for _ in 0..3 {
        engine.process_command(id, "next").await.expect("advance");
    }
    assert_eq!(engine.session(id).await.expect("view").cursor, 3);

    let outcome = engine.process_command(id, "next").await.expect("complete");
    assert_eq!(outcome.transition, Transition::Completed);
    assert_eq!(outcome.session.status, SessionStatus::Terminated);

    let err = engine.process_command(id, "next").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionInactive);
}

#[tokio::test]
async fn test_simplify_at_level_one_changes_nothing() {
    let engine = engine(lesson_then_steps(3));
    let created = engine
        .create_session("Physics", "Work", 1)
        .await
        .expect("session created");

    let outcome = engine
        .process_command(created.id, "simplify")
        .await
        .expect("no-op");

    assert_eq!(outcome.session.level.value(), 1);
    assert_eq!(outcome.session.current_step, created.current_step);
}

#[tokio::test]
async fn test_simplify_five_times_from_four_stops_at_one() {
    let engine = engine(lesson_then_steps(5));
    let created = engine
        .create_session("Chemistry", "Acids", 4)
        .await
        .expect("session created");
    let mut previous = created.current_step.expect("step").id;

    for round in 0..5 {
        let outcome = engine
            .process_command(created.id, "simplify")
            .await
            .expect("simplify");
        let current = outcome.session.current_step.expect("step").id;
        if round < 3 {
            assert_eq!(outcome.transition, Transition::Simplified);
            assert_ne!(current, previous);
        } else {
            assert_eq!(outcome.transition, Transition::Unchanged);
            assert_eq!(current, previous);
        }
        previous = current;
    }

    let view = engine.session(created.id).await.expect("view");
    assert_eq!(view.level, ComprehensionLevel::ELEMENTARY);
}

#[tokio::test]
async fn test_unknown_subject_is_rejected() {
    let engine = engine(lesson_then_steps(3));
    let err = engine
        .create_session("Astrology", "Horoscopes", 2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSubject);
}

// ============================================================================
// Generation contract
// ============================================================================

#[tokio::test]
async fn test_every_subject_and_level_yields_three_to_five_steps() {
    for subject in Subject::ALL {
        for (value, count) in [(1u8, 3usize), (2, 4), (3, 5), (4, 7)] {
            let level = ComprehensionLevel::new(value).expect("level");
            let generator = ContentGenerator::new(
                Arc::new(ScriptedClient::always(lesson_json(count, 50))),
                policy(),
            );

            let steps = generator
                .generate_steps(subject, "Overview", level, None)
                .await
                .expect("steps");

            assert!((3..=5).contains(&steps.len()), "{subject} level {value}");
            assert!(steps.iter().all(|s| validate(s).is_accepted() || s.degraded));
        }
    }
}

#[tokio::test]
async fn test_slow_backend_times_out_within_deadline() {
    let client = ScriptedClient::always_delayed(Duration::from_secs(10));
    let request = GenerationRequest::new("prompt", 600, Duration::from_secs(30));

    let started = Instant::now();
    let err = generate_within(&client, &request).await.unwrap_err();

    assert!(matches!(err, GenerationError::Timeout { .. }));
    assert!(started.elapsed() < HARD_DEADLINE + Duration::from_millis(500));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_sessions_progress_independently() {
    let engine = Arc::new(engine(ScriptedClient::new(vec![
        Reply::delayed(Duration::from_millis(20), lesson_json(5, 50)),
    ])));

    let created = join_all((0..8).map(|_| {
        let engine = Arc::clone(&engine);
        async move { engine.create_session("Biology", "Cells", 2).await }
    }))
    .await;
    let ids: Vec<_> = created
        .into_iter()
        .map(|view| view.expect("session created").id)
        .collect();

    // Session i receives i % 4 `next` commands, all sessions at once.
    let advanced = join_all(ids.iter().enumerate().map(|(i, id)| {
        let engine = Arc::clone(&engine);
        let id = *id;
        async move {
            for _ in 0..(i % 4) {
                engine.process_command(id, "next").await?;
            }
            engine.session(id).await
        }
    }))
    .await;

    for (i, view) in advanced.into_iter().enumerate() {
        assert_eq!(view.expect("view").cursor, i % 4);
    }
}

#[tokio::test]
async fn test_concurrent_commands_on_one_session_are_serialized() {
    let engine = Arc::new(engine(lesson_then_steps(5)));
    let id = engine
        .create_session("Geography", "Rivers", 2)
        .await
        .expect("session created")
        .id;

    let results = join_all((0..4).map(|_| {
        let engine = Arc::clone(&engine);
        async move { engine.process_command(id, "next").await }
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));
    let view = engine.session(id).await.expect("view");
    assert_eq!(view.cursor, 4);
    assert_eq!(view.revision, 4);
}
