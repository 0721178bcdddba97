//! Configuration types for the Stepwise engine.
//!
//! Configuration is read from `stepwise.json` (camelCase keys). Every field
//! has a default, so an absent file or a partial file is valid; values are
//! checked by [`Config::validate`] after loading and again after command-line
//! overrides are applied.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::HARD_DEADLINE;
use crate::error::{Result, StepwiseError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "stepwise.json";

/// Default generation endpoint (a local Ollama server).
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

/// Default generation model.
fn default_model() -> String {
    "llama3.2".to_string()
}

/// Default per-call deadline in milliseconds.
const fn default_call_timeout_ms() -> u64 {
    2000
}

/// Default upper bound on generated output size.
const fn default_max_output_tokens() -> u32 {
    600
}

/// Default number of attempts per generation operation.
const fn default_max_attempts() -> u32 {
    3
}

/// Default number of retries after a timeout or unreachable backend.
const fn default_backend_retries() -> u32 {
    1
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default directory holding textbook passages.
fn default_passages_dir() -> String {
    "passages".to_string()
}

/// Default number of passages merged into a prompt.
const fn default_top_k() -> usize {
    3
}

/// Default idle time-to-live for sessions and assessments, in seconds.
const fn default_idle_ttl_secs() -> u64 {
    3600
}

/// Default interval between idle sweeps, in seconds.
const fn default_sweep_interval_secs() -> u64 {
    60
}

/// Main configuration for a Stepwise server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Optional context retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Session lifetime settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `stepwise.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StepwiseError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `stepwise.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `StepwiseError::ConfigValidationError` if a value
    /// is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StepwiseError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StepwiseError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::ConfigValidationError` naming the first invalid
    /// field.
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.retrieval.validate()?;
        self.session.validate()
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Base URL of the generation service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name passed to the generation service.
    #[serde(default = "default_model")]
    pub model: String,

    /// Deadline for one generation call in milliseconds; at most 2000.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Upper bound on generated output size, in tokens.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Attempts per generation operation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retries allowed after a timeout or unreachable backend.
    #[serde(default = "default_backend_retries")]
    pub backend_retries: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            call_timeout_ms: default_call_timeout_ms(),
            max_output_tokens: default_max_output_tokens(),
            max_attempts: default_max_attempts(),
            backend_retries: default_backend_retries(),
            temperature: default_temperature(),
        }
    }
}

impl GenerationConfig {
    /// Returns the per-call deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(StepwiseError::config_validation(
                "generation.endpoint must not be empty",
                "Set generation.endpoint to the base URL of your generation service, e.g. http://localhost:11434",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(StepwiseError::config_validation(
                "generation.model must not be empty",
                "Set generation.model to a model available on the generation service",
            ));
        }

        if self.call_timeout_ms == 0 || self.call_timeout() > HARD_DEADLINE {
            return Err(StepwiseError::config_validation(
                format!(
                    "generation.callTimeoutMs must be between 1 and {}, got {}",
                    HARD_DEADLINE.as_millis(),
                    self.call_timeout_ms
                ),
                "Generation calls are capped at two seconds; lower generation.callTimeoutMs",
            ));
        }

        if self.max_output_tokens == 0 {
            return Err(StepwiseError::config_validation(
                "generation.maxOutputTokens must be greater than 0",
                "Set generation.maxOutputTokens to at least 1 in your stepwise.json",
            ));
        }

        if self.max_attempts == 0 {
            return Err(StepwiseError::config_validation(
                "generation.maxAttempts must be greater than 0",
                "Set generation.maxAttempts to at least 1 in your stepwise.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StepwiseError::config_validation(
                format!(
                    "generation.temperature must be between 0 and 2, got {}",
                    self.temperature
                ),
                "Use a temperature such as 0.7 in your stepwise.json",
            ));
        }

        Ok(())
    }
}

/// Optional context retrieval settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Whether prompts are enriched with textbook passages.
    #[serde(default)]
    pub enabled: bool,

    /// Directory of `.txt` / `.md` passage files.
    #[serde(default = "default_passages_dir")]
    pub passages_dir: String,

    /// Number of passages merged into one prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            passages_dir: default_passages_dir(),
            top_k: default_top_k(),
        }
    }
}

impl RetrievalConfig {
    /// Returns the passages directory as a path.
    #[must_use]
    pub fn passages_path(&self) -> PathBuf {
        PathBuf::from(&self.passages_dir)
    }

    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.top_k == 0 {
            return Err(StepwiseError::config_validation(
                "retrieval.topK must be greater than 0",
                "Set retrieval.topK to at least 1, or disable retrieval",
            ));
        }

        if self.passages_dir.trim().is_empty() {
            return Err(StepwiseError::config_validation(
                "retrieval.passagesDir must not be empty",
                "Point retrieval.passagesDir at a directory of .txt or .md files",
            ));
        }

        Ok(())
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Idle time after which sessions and assessments are evicted, in seconds.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Interval between idle sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Returns the idle time-to-live.
    #[must_use]
    pub const fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    /// Returns the sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.idle_ttl_secs == 0 {
            return Err(StepwiseError::config_validation(
                "session.idleTtlSecs must be greater than 0",
                "Set session.idleTtlSecs to at least 1 second (3600 is typical)",
            ));
        }

        if self.sweep_interval_secs == 0 {
            return Err(StepwiseError::config_validation(
                "session.sweepIntervalSecs must be greater than 0",
                "Set session.sweepIntervalSecs to at least 1 second in your stepwise.json",
            ));
        }

        Ok(())
    }
}
