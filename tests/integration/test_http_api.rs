//! Integration tests for the HTTP API against a live server.
//!
//! Each test binds the router to an ephemeral port and talks to it over
//! real HTTP, covering the assessment, session, and error surfaces.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use stepwise_engine::fake::{lesson_json, scaffolded_body, step_json, Reply, ScriptedClient};
use stepwise_engine::{
    create_router, AppState, GenerationError, GenerationPolicy, LearningEngine, Retrieval,
};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(client: ScriptedClient) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let policy = GenerationPolicy {
        call_timeout: Duration::from_millis(200),
        operation_budget: Duration::from_millis(400),
        ..GenerationPolicy::default()
    };
    let engine = LearningEngine::in_memory(
        Arc::new(client),
        policy,
        Retrieval::Absent,
        Duration::from_secs(3600),
    );
    let router = create_router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}/api"), handle)
}

fn lesson_server_client() -> ScriptedClient {
    ScriptedClient::new(vec![
        Reply::text(lesson_json(4, 50)),
        Reply::text(step_json("A simpler view", &scaffolded_body(42))),
    ])
}

async fn post(url: &str, body: Option<Value>) -> (StatusCode, Value) {
    let client = reqwest::Client::new();
    let mut request = client.post(url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Failed to send HTTP request");
    let status = response.status();
    (status, response.json().await.expect("JSON body"))
}

async fn get(url: &str) -> (StatusCode, Value) {
    let response = reqwest::get(url).await.expect("Failed to send HTTP request");
    let status = response.status();
    (status, response.json().await.expect("JSON body"))
}

// ============================================================================
// Assessment to session
// ============================================================================

#[tokio::test]
async fn test_assessment_level_feeds_learner_session() {
    let (base, _handle) = spawn_test_server(lesson_server_client()).await;

    let (status, started) = post(&format!("{base}/assessments"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = started["id"].as_str().expect("assessment id").to_string();

    let questions = started["questions"].as_array().expect("questions");
    for (question, option) in questions.iter().zip(["c", "d", "c", "b", "a"]) {
        let (status, progress) = post(
            &format!("{base}/assessments/{id}/answers"),
            Some(json!({ "questionId": question["id"], "optionId": option })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["complete"], progress["remaining"] == 0);
    }

    let (status, level) = post(
        &format!("{base}/assessments/{id}/level"),
        Some(json!({ "learnerId": "grace" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["level"], 3);

    let (status, session) = post(
        &format!("{base}/sessions"),
        Some(json!({ "subject": "physics", "topic": "Work", "learnerId": "grace" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["level"], 3);
    assert_eq!(session["stepCount"], 4);
    assert_eq!(session["status"], "active");

    // The assessment is discarded once its level is calculated.
    let (status, body) = post(&format!("{base}/assessments/{id}/level"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

// ============================================================================
// Session commands
// ============================================================================

#[tokio::test]
async fn test_session_commands_over_http() {
    let (base, _handle) = spawn_test_server(lesson_server_client()).await;

    let (_, session) = post(
        &format!("{base}/sessions"),
        Some(json!({ "subject": "Chemistry", "topic": "Bonds", "level": 2 })),
    )
    .await;
    let id = session["id"].as_str().expect("session id").to_string();
    let commands = format!("{base}/sessions/{id}/commands");

    let (status, outcome) = post(&commands, Some(json!({ "command": "NEXT" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["transition"], "advanced");
    assert_eq!(outcome["session"]["cursor"], 1);

    let (status, outcome) = post(&commands, Some(json!({ "command": "simplify" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["transition"], "simplified");
    assert_eq!(outcome["session"]["level"], 1);
    assert_eq!(outcome["session"]["currentStep"]["title"], "A simpler view");

    let (status, outcome) = post(&commands, Some(json!({ "command": "exit" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["transition"], "exited");
    assert!(outcome["session"]["currentStep"].is_null());

    let (status, body) = post(&commands, Some(json!({ "command": "next" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "session_inactive");

    let (status, view) = get(&format!("{base}/sessions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "terminated");
}

// ============================================================================
// Error surface
// ============================================================================

#[tokio::test]
async fn test_validation_errors_are_400() {
    let (base, _handle) = spawn_test_server(lesson_server_client()).await;
    let sessions = format!("{base}/sessions");

    let cases = [
        (json!({ "subject": "Astrology", "topic": "Stars", "level": 2 }), "invalid_subject"),
        (json!({ "subject": "Physics", "topic": "  ", "level": 2 }), "invalid_topic"),
        (json!({ "subject": "Physics", "topic": "Work", "level": 9 }), "invalid_level"),
        (json!({ "subject": "Physics", "topic": "Work" }), "invalid_input"),
    ];

    for (body, kind) in cases {
        let (status, error) = post(&sessions, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{kind}");
        assert_eq!(error["kind"], kind);
        assert!(error["error"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[tokio::test]
async fn test_unknown_session_and_command() {
    let (base, _handle) = spawn_test_server(lesson_server_client()).await;

    let (status, body) = get(&format!("{base}/sessions/{}", uuid_like())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "session_not_found");

    let (_, session) = post(
        &format!("{base}/sessions"),
        Some(json!({ "subject": "History", "topic": "Rome", "level": 4 })),
    )
    .await;
    let id = session["id"].as_str().expect("session id");
    let (status, body) = post(
        &format!("{base}/sessions/{id}/commands"),
        Some(json!({ "command": "skip" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_command");
}

#[tokio::test]
async fn test_unavailable_backend_is_502() {
    let client = ScriptedClient::new(vec![Reply::fail(GenerationError::unavailable(
        "connection refused",
    ))]);
    let (base, _handle) = spawn_test_server(client).await;

    let (status, body) = post(
        &format!("{base}/sessions"),
        Some(json!({ "subject": "Biology", "topic": "Cells", "level": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "generation_unavailable");
}

#[tokio::test]
async fn test_slow_backend_is_504() {
    let (base, _handle) =
        spawn_test_server(ScriptedClient::always_delayed(Duration::from_secs(5))).await;

    let (status, body) = post(
        &format!("{base}/sessions"),
        Some(json!({ "subject": "Biology", "topic": "Cells", "level": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["kind"], "generation_timeout");
}

/// A well-formed identifier no session will ever have.
fn uuid_like() -> &'static str {
    "00000000-0000-4000-8000-000000000000"
}
