//! HTTP API for the Stepwise engine.
//!
//! # Endpoints
//!
//! - `POST /api/assessments` - Start an assessment
//! - `POST /api/assessments/:id/answers` - Submit one answer
//! - `POST /api/assessments/:id/level` - Calculate the level (optionally store it for a learner)
//! - `GET /api/learners/:id/level` - Read a learner's stored level
//! - `POST /api/sessions` - Create a learning session
//! - `GET /api/sessions/:id` - Read a session
//! - `POST /api/sessions/:id/commands` - Send `next`, `simplify`, or `exit`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use stepwise_engine::{
//!     create_router, AppState, GenerationPolicy, HttpGenerationClient, LearningEngine, Retrieval,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpGenerationClient::new("http://localhost:11434", "llama3.2", 0.7)?;
//! let engine = LearningEngine::in_memory(
//!     Arc::new(client),
//!     GenerationPolicy::default(),
//!     Retrieval::Absent,
//!     Duration::from_secs(3600),
//! );
//! let router = create_router(AppState::new(engine));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::{AnswerProgress, AssessmentView};
use crate::engine::LearningEngine;
use crate::error::{ErrorKind, StepwiseError};
use crate::level::ComprehensionLevel;
use crate::session::{CommandOutcome, SessionView};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting an answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// The question being answered.
    pub question_id: String,
    /// The chosen option.
    pub option_id: String,
}

/// Request body for calculating a level.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRequest {
    /// Learner to store the level for.
    #[serde(default)]
    pub learner_id: Option<String>,
}

/// A comprehension level, optionally tied to a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelResponse {
    /// The level, 1 to 4.
    pub level: ComprehensionLevel,
    /// The learner it was stored for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
}

/// Request body for creating a session.
///
/// Exactly one of `level` and `learner_id` is expected; `level` wins if both
/// are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Subject name.
    pub subject: String,
    /// Topic to study.
    pub topic: String,
    /// Explicit level.
    #[serde(default)]
    pub level: Option<i64>,
    /// Learner whose stored level is used.
    #[serde(default)]
    pub learner_id: Option<String>,
}

/// Request body for a session command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// `next`, `simplify`, or `exit`.
    pub command: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Enumerable error kind.
    pub kind: ErrorKind,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The engine serving every request.
    pub engine: Arc<LearningEngine>,
}

impl AppState {
    /// Wraps an engine.
    #[must_use]
    pub fn new(engine: LearningEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Wraps an engine that is shared with other tasks (e.g. the sweeper).
    #[must_use]
    pub const fn shared(engine: Arc<LearningEngine>) -> Self {
        Self { engine }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Engine errors rendered as HTTP responses.
#[derive(Debug)]
struct ApiError(StepwiseError);

impl From<StepwiseError> for ApiError {
    fn from(err: StepwiseError) -> Self {
        Self(err)
    }
}

/// Maps an error kind onto an HTTP status.
const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput
        | ErrorKind::IncompleteAssessment
        | ErrorKind::InvalidSubject
        | ErrorKind::InvalidTopic
        | ErrorKind::InvalidLevel
        | ErrorKind::InvalidCommand => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::SessionNotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateAnswer | ErrorKind::SessionInactive | ErrorKind::SessionConflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::GenerationUnavailable | ErrorKind::GenerationFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::GenerationTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Config | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            warn!(%kind, error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            kind,
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, with CORS middleware for browser clients and
/// tracing middleware for request logging.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/assessments", post(handle_start_assessment))
        .route("/assessments/:id/answers", post(handle_submit_answer))
        .route("/assessments/:id/level", post(handle_calculate_level))
        .route("/learners/:id/level", get(handle_learner_level))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/:id", get(handle_get_session))
        .route("/sessions/:id/commands", post(handle_command));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/assessments`.
async fn handle_start_assessment(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<AssessmentView>) {
    let view = state.engine.start_assessment().await;
    (StatusCode::CREATED, Json(view))
}

/// Handler for `POST /api/assessments/:id/answers`.
async fn handle_submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<AnswerProgress> {
    let progress = state
        .engine
        .submit_answer(id, &request.question_id, &request.option_id)
        .await?;
    Ok(Json(progress))
}

/// Handler for `POST /api/assessments/:id/level`.
///
/// The body is optional; an empty body calculates without storing.
async fn handle_calculate_level(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Option<Json<LevelRequest>>,
) -> ApiResult<LevelResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let level = state
        .engine
        .calculate_level(id, request.learner_id.as_deref())
        .await?;

    Ok(Json(LevelResponse {
        level,
        learner_id: request.learner_id.map(|l| l.trim().to_string()),
    }))
}

/// Handler for `GET /api/learners/:id/level`.
async fn handle_learner_level(
    State(state): State<Arc<AppState>>,
    Path(learner): Path<String>,
) -> ApiResult<LevelResponse> {
    let level = state.engine.learner_level(&learner).await?;
    Ok(Json(LevelResponse {
        level,
        learner_id: Some(learner),
    }))
}

/// Handler for `POST /api/sessions`.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    info!(
        subject = %request.subject,
        topic = %request.topic,
        level = ?request.level,
        "Create session request received"
    );

    let view = match (request.level, request.learner_id.as_deref()) {
        (Some(level), _) => {
            state
                .engine
                .create_session(&request.subject, &request.topic, level)
                .await?
        }
        (None, Some(learner)) => {
            state
                .engine
                .create_session_for_learner(&request.subject, &request.topic, learner)
                .await?
        }
        (None, None) => {
            return Err(StepwiseError::invalid_input(
                "either 'level' or 'learnerId' is required",
            )
            .into());
        }
    };

    Ok((StatusCode::CREATED, Json(view)))
}

/// Handler for `GET /api/sessions/:id`.
async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    Ok(Json(state.engine.session(id).await?))
}

/// Handler for `POST /api/sessions/:id/commands`.
async fn handle_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<CommandOutcome> {
    info!(session_id = %id, command = %request.command, "Command received");
    Ok(Json(state.engine.process_command(id, &request.command).await?))
}

// ============================================================================
// Tests
// ============================================================================
