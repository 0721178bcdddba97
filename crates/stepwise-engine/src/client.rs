//! Generation client adapter.
//!
//! The engine talks to its text-generation backend only through the
//! [`GenerationClient`] trait. Every call is bounded by a hard deadline of
//! two seconds: [`generate_within`] wraps any client in a timeout so that an
//! overdue call is dropped (and with it the in-flight request) and reported as
//! [`GenerationError::Timeout`]. A response arriving after the deadline has
//! nowhere to go.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard upper bound on a single generation call.
pub const HARD_DEADLINE: Duration = Duration::from_secs(2);

/// Errors a generation backend can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The backend did not answer before the deadline.
    #[error("generation timed out after {after_ms}ms")]
    Timeout {
        /// The deadline that was exceeded, in milliseconds.
        after_ms: u64,
    },

    /// The backend could not be reached or refused the request.
    #[error("generation backend unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The backend answered with something that is not usable text.
    #[error("generation backend returned malformed output: {message}")]
    MalformedOutput {
        /// Description of the problem.
        message: String,
    },
}

impl GenerationError {
    /// Creates a `Timeout` error for the given deadline.
    #[must_use]
    pub fn timeout(deadline: Duration) -> Self {
        Self::Timeout {
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a `MalformedOutput` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: message.into(),
        }
    }

    /// Returns `true` for timeouts and unreachable backends.
    #[must_use]
    pub const fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// One prompt submitted to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Upper bound on the size of the generated output, in tokens.
    pub max_output_tokens: u32,
    /// Time allowed for this call; never more than [`HARD_DEADLINE`].
    pub deadline: Duration,
}

impl GenerationRequest {
    /// Creates a request, clamping the deadline to [`HARD_DEADLINE`].
    #[must_use]
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32, deadline: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            max_output_tokens,
            deadline: deadline.min(HARD_DEADLINE),
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Sends the prompt and returns the raw generated text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}

/// Runs one generation call under the request deadline.
///
/// The client future is dropped when the deadline passes, which cancels the
/// in-flight request.
pub async fn generate_within(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
) -> Result<String, GenerationError> {
    let deadline = request.deadline.min(HARD_DEADLINE);
    let started = Instant::now();

    match tokio::time::timeout(deadline, client.generate(request)).await {
        Ok(result) => {
            debug!(
                client = client.name(),
                elapsed_ms = started.elapsed().as_millis(),
                ok = result.is_ok(),
                "Generation call finished"
            );
            result
        }
        Err(_) => {
            warn!(
                client = client.name(),
                deadline_ms = deadline.as_millis(),
                "Generation call exceeded deadline; abandoning request"
            );
            Err(GenerationError::timeout(deadline))
        }
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Generation client for an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseBody {
    response: Option<String>,
}

impl HttpGenerationClient {
    /// Creates a client for the given endpoint and model.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Unavailable` if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HARD_DEADLINE)
            .build()
            .map_err(|e| GenerationError::unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }
}

/// Maps transport errors onto the adapter's error kinds.
fn map_http_error(error: &reqwest::Error, deadline: Duration) -> GenerationError {
    if error.is_timeout() {
        GenerationError::timeout(deadline)
    } else if error.is_connect() {
        GenerationError::unavailable(format!("connection error: {error}"))
    } else if error.is_decode() {
        GenerationError::malformed(format!("undecodable response body: {error}"))
    } else {
        GenerationError::unavailable(format!("HTTP error: {error}"))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = GenerateRequestBody {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                num_predict: request.max_output_tokens,
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.url())
            .timeout(request.deadline)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_http_error(&e, request.deadline))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::unavailable(format!(
                "backend answered {status}: {}",
                detail.trim()
            )));
        }

        let parsed: GenerateResponseBody = response
            .json()
            .await
            .map_err(|e| map_http_error(&e, request.deadline))?;

        match parsed.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(GenerationError::malformed("response field missing or empty")),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}
