//! Deterministic generation backends and content builders for tests.
//!
//! [`ScriptedClient`] replays a queue of replies in order and then repeats
//! its fallback reply forever. Every prompt it receives is recorded so tests
//! can assert on prompt construction and retries.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::client::{GenerationClient, GenerationError, GenerationRequest};

/// One scripted backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer immediately with the given text.
    Text(String),
    /// Answer with the given text after a delay.
    Delayed(Duration, String),
    /// Fail with the given error.
    Fail(GenerationError),
}

impl Reply {
    /// Creates an immediate text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a delayed text reply.
    #[must_use]
    pub fn delayed(delay: Duration, text: impl Into<String>) -> Self {
        Self::Delayed(delay, text.into())
    }

    /// Creates a failing reply.
    #[must_use]
    pub const fn fail(error: GenerationError) -> Self {
        Self::Fail(error)
    }
}

/// A generation client that replays scripted replies.
#[derive(Debug)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    /// Creates a client that replays `replies`, then repeats the last one.
    ///
    /// An empty script falls back to an `Unavailable` error.
    #[must_use]
    pub fn new(replies: Vec<Reply>) -> Self {
        let fallback = replies.last().cloned().unwrap_or_else(|| {
            Reply::Fail(GenerationError::unavailable("no scripted reply"))
        });
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a client that always answers with `text`.
    #[must_use]
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![Reply::text(text)])
    }

    /// Creates a client whose every reply arrives after `delay`.
    #[must_use]
    pub fn always_delayed(delay: Duration) -> Self {
        Self::new(vec![Reply::delayed(delay, "{}")])
    }

    /// Returns every prompt received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Returns the number of calls received so far.
    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().await.push(request.prompt.clone());

        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Fail(error) => Err(error),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Content builders
// ============================================================================

/// Builds a bulleted body of exactly `words` words.
#[must_use]
pub fn scaffolded_body(words: usize) -> String {
    const VOCABULARY: [&str; 8] = [
        "force", "moves", "an", "object", "through", "a", "distance", "steadily",
    ];

    let mut lines = Vec::new();
    let mut remaining = words;
    let mut next_word = 0usize;
    while remaining > 0 {
        let take = remaining.min(10);
        let mut line = vec!["-".to_string()];
        for _ in 1..take {
            line.push(VOCABULARY[next_word % VOCABULARY.len()].to_string());
            next_word += 1;
        }
        lines.push(line.join(" "));
        remaining -= take;
    }
    lines.join("\n")
}

/// Builds the JSON for a single step.
#[must_use]
pub fn step_json(title: &str, body: &str) -> String {
    json!({ "title": title, "body": body }).to_string()
}

/// Builds the JSON for a batch of `count` valid steps of `words` words each.
#[must_use]
pub fn lesson_json(count: usize, words: usize) -> String {
    let steps: Vec<_> = (1..=count)
        .map(|i| json!({ "title": format!("Step {i}"), "body": scaffolded_body(words) }))
        .collect();
    json!({ "steps": steps }).to_string()
}
