//! Core invocation API: wraps a low-level completion client with a fixed retry budget
//! and resilient JSON extraction.
//!
//! Quick start:
//! - Implement (or pick) a [`LowLevelClient`]
//! - Wrap it in a [`PromptInvoker`] and call [`PromptInvoker::invoke`] with a rendered [`Prompt`]
//! - Validate the returned value against the flow's output contract (see `flows::contract`)

use crate::error::{AIError, ContractViolation, GenerationError, InvokeError};
use crate::json_utils::extract_json;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use tracing::{debug, error, info, instrument, warn};

/// One attempt plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;

/// A fully rendered request for the completion service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    /// Stable prompt name, used in logs and errors
    pub name: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Optional image attached to the user turn, as a `data:` URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data_uri: Option<String>,
}

impl Prompt {
    pub fn new(name: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            image_data_uri: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_image(mut self, image_data_uri: Option<String>) -> Self {
        self.image_data_uri = image_data_uri;
        self
    }

    /// Total characters sent, for logging.
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Low-level completion-service abstraction.
///
/// Implementors provide `ask_raw`, which executes a prompt and returns the raw
/// model text. Retries, extraction and validation happen above this layer.
#[async_trait]
pub trait LowLevelClient: Send + Sync + Debug {
    /// The only method that implementations must provide
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError>;

    /// Report a missing credential before any call is attempted.
    fn ensure_configured(&self) -> Result<(), AIError> {
        Ok(())
    }

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn LowLevelClient>;
}

// Implement Clone for Box<dyn LowLevelClient>
impl Clone for Box<dyn LowLevelClient> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl LowLevelClient for Box<dyn LowLevelClient> {
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        self.as_ref().ask_raw(prompt).await
    }

    fn ensure_configured(&self) -> Result<(), AIError> {
        self.as_ref().ensure_configured()
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        self.as_ref().clone_box()
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

/// Wraps a [`LowLevelClient`] with the retry and extraction policy shared by every flow.
///
/// Attempts are immediate: failures are assumed to be malformed output rather than
/// rate limiting, so there is no backoff between them.
#[derive(Debug, Clone)]
pub struct PromptInvoker<C: LowLevelClient> {
    client: C,
    config: RetryConfig,
}

impl<C: LowLevelClient> PromptInvoker<C> {
    pub fn new(client: C, config: RetryConfig) -> Self {
        info!(max_attempts = config.max_attempts, "Creating new PromptInvoker");
        Self { client, config }
    }

    /// Run `prompt` until one attempt yields a non-empty candidate, up to `max_attempts`.
    ///
    /// The candidate is the JSON extracted from the response text, or the raw text itself
    /// as a `Value::String` when no JSON could be extracted. A missing credential fails
    /// immediately with [`InvokeError::Configuration`]. When every attempt fails the last
    /// failure is returned inside [`InvokeError::AttemptsExhausted`].
    #[instrument(target = "exam_forge::invoker", skip(self, prompt), fields(prompt = %prompt.name, prompt_len = prompt.len()))]
    pub async fn invoke(&self, prompt: Prompt) -> Result<Value, InvokeError> {
        if let Err(e) = self.client.ensure_configured() {
            error!(error = %e, "Completion service is not configured");
            return Err(InvokeError::Configuration(e));
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last_failure = None;

        for attempt in 1..=attempts {
            info!(attempt, attempts, "Running prompt");
            match self.attempt(prompt.clone()).await {
                Ok(candidate) => {
                    info!(attempt, "Prompt succeeded");
                    return Ok(candidate);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Prompt attempt failed");
                    last_failure = Some(e);
                }
            }
        }

        error!(attempts, "All attempts failed");
        Err(InvokeError::AttemptsExhausted {
            prompt: prompt.name,
            attempts,
            last: Box::new(last_failure.unwrap_or(InvokeError::InvalidOutput)),
        })
    }

    /// [`PromptInvoker::invoke`] followed by deserialization into `T`.
    ///
    /// A candidate that does not deserialize is a contract violation of `flow`: the call
    /// itself succeeded, so it is not retried.
    pub async fn invoke_typed<T: DeserializeOwned>(
        &self,
        flow: &'static str,
        prompt: Prompt,
    ) -> Result<T, GenerationError> {
        let candidate = self.invoke(prompt).await?;
        serde_json::from_value(candidate).map_err(|e| {
            warn!(flow, error = %e, "Candidate does not match the output contract");
            ContractViolation::new(flow, format!("output does not match contract: {}", e)).into()
        })
    }

    async fn attempt(&self, prompt: Prompt) -> Result<Value, InvokeError> {
        let raw = self.client.ask_raw(prompt).await?;
        if raw.trim().is_empty() {
            return Err(InvokeError::EmptyOutput);
        }

        let candidate = match extract_json(&raw) {
            Some(parsed) => parsed,
            None => {
                debug!(response_len = raw.len(), "No JSON extracted, keeping raw text as candidate");
                Value::String(raw)
            }
        };

        if candidate.is_null() {
            return Err(InvokeError::InvalidOutput);
        }
        Ok(candidate)
    }
}

/// Append JSON schema guidance for `T` to a user prompt.
pub fn add_schema_guidance<T: JsonSchema>(prompt: &str) -> String {
    let schema = schema_for!(T);
    let schema_json = serde_json::to_string_pretty(&schema)
        .unwrap_or_else(|_| "Schema serialization failed".to_string());

    format!(
        "{}\n\n## Response Format\nRespond with a single JSON value matching this schema:\n```json\n{}\n```",
        prompt, schema_json
    )
}
