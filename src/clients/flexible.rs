use crate::core::{LowLevelClient, Prompt};
use crate::error::AIError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Completion-service provider selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Gemini,
    Claude,
    DeepSeek,
    Mock,
}

impl FromStr for ClientType {
    type Err = String;

    /// Parse client type from string (case insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "claude" | "anthropic" => Ok(Self::Claude),
            "deepseek" => Ok(Self::DeepSeek),
            "mock" => Ok(Self::Mock),
            _ => Err(format!(
                "Unknown client type: '{}'. Supported: gemini, claude, deepseek, mock",
                s
            )),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Gemini => write!(f, "gemini"),
            ClientType::Claude => write!(f, "claude"),
            ClientType::DeepSeek => write!(f, "deepseek"),
            ClientType::Mock => write!(f, "mock"),
        }
    }
}

impl ClientType {
    /// Build the client, reading its credential from the environment.
    ///
    /// A provider compiled out of this build is a configuration error.
    pub fn build(self, model: Option<String>) -> Result<Box<dyn LowLevelClient>, String> {
        match self {
            #[cfg(feature = "gemini")]
            ClientType::Gemini => {
                let client = super::gemini::GeminiClient::default();
                Ok(Box::new(match model {
                    Some(model) => client.with_model(model),
                    None => client,
                }))
            }
            #[cfg(feature = "anthropic")]
            ClientType::Claude => {
                let client = super::claude::ClaudeClient::default();
                Ok(Box::new(match model {
                    Some(model) => client.with_model(model),
                    None => client,
                }))
            }
            #[cfg(feature = "deepseek")]
            ClientType::DeepSeek => {
                let client = super::deepseek::DeepSeekClient::default();
                Ok(Box::new(match model {
                    Some(model) => client.with_model(model),
                    None => client,
                }))
            }
            ClientType::Mock => {
                // Nothing is scripted, so every call fails; use FlexibleClient::mock() to drive it.
                let (mock_client, _handle) = super::mock::MockClient::new();
                Ok(Box::new(mock_client))
            }
            #[allow(unreachable_patterns)]
            other => Err(format!("provider '{}' is not enabled in this build", other)),
        }
    }
}

/// Flexible client that wraps any LowLevelClient behind a shared pointer
#[derive(Debug, Clone)]
pub struct FlexibleClient {
    inner: Arc<dyn LowLevelClient>,
}

impl FlexibleClient {
    /// Create a new FlexibleClient wrapping the given client
    pub fn new(client: Box<dyn LowLevelClient>) -> Self {
        Self { inner: Arc::from(client) }
    }

    pub fn from_type(client_type: ClientType, model: Option<String>) -> Result<Self, String> {
        Ok(Self::new(client_type.build(model)?))
    }

    /// Create a FlexibleClient with a mock and return the handle for configuration
    pub fn mock() -> (Self, Arc<super::mock::MockHandle>) {
        let (mock_client, handle) = super::mock::MockClient::new();
        (Self::new(Box::new(mock_client)), handle)
    }
}

#[async_trait]
impl LowLevelClient for FlexibleClient {
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        self.inner.ask_raw(prompt).await
    }

    fn ensure_configured(&self) -> Result<(), AIError> {
        self.inner.ensure_configured()
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
