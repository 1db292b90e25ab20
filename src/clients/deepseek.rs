use crate::clients::check_status;
use crate::config::KeyFromEnv;
use crate::core::{LowLevelClient, Prompt};
use crate::error::{AIError, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Serialize)]
struct DeepSeekRequest {
    model: String,
    messages: Vec<DeepSeekMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct DeepSeekMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    choices: Vec<DeepSeekChoice>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekChoice {
    message: DeepSeekResponseMessage,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Configuration for DeepSeek client
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            max_tokens: 8192,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeepSeekClient {
    config: DeepSeekConfig,
    client: Client,
}

impl KeyFromEnv for DeepSeekClient {
    const KEY_NAME: &'static str = "DEEPSEEK_API_KEY";
}

impl Default for DeepSeekClient {
    fn default() -> Self {
        let config = DeepSeekConfig {
            api_key: Self::find_key().unwrap_or_default(),
            ..DeepSeekConfig::default()
        };
        Self::new(config)
    }
}

impl DeepSeekClient {
    /// Create a new DeepSeek client with full configuration
    pub fn new(config: DeepSeekConfig) -> Self {
        info!(model = %config.model, "Creating new DeepSeek client");
        Self { config, client: Client::new() }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.config.model = model;
        self
    }
}

#[async_trait]
impl LowLevelClient for DeepSeekClient {
    #[instrument(skip(self, prompt), fields(prompt = %prompt.name, model = %self.config.model))]
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        debug!(prompt_len = prompt.len(), "Preparing DeepSeek API request");
        if prompt.image_data_uri.is_some() {
            warn!("DeepSeek chat does not accept images; sending text only");
        }

        let request = DeepSeekRequest {
            model: self.config.model.clone(),
            messages: vec![
                DeepSeekMessage { role: "system".to_string(), content: prompt.system },
                DeepSeekMessage { role: "user".to_string(), content: prompt.user },
            ],
            max_tokens: self.config.max_tokens,
            temperature: prompt.temperature,
            response_format: ResponseFormat { format_type: "json_object".to_string() },
        };

        let response = self
            .client
            .post("https://api.deepseek.com/v1/chat/completions")
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::DeepSeek(ProviderError::Http(e.to_string()))
            })?;
        let response = check_status(response, "deepseek", AIError::DeepSeek).await?;

        let deepseek_response: DeepSeekResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse DeepSeek response JSON");
            AIError::DeepSeek(ProviderError::Http(e.to_string()))
        })?;

        debug!(choices_count = deepseek_response.choices.len(), "Parsed DeepSeek response");

        // A choice with null content is passed through as "" so the invoker counts it
        // as an empty-output attempt.
        let content = deepseek_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| {
                error!("No choices in DeepSeek response");
                AIError::DeepSeek(ProviderError::Api("No choices in response".to_string()))
            })?;

        info!(response_len = content.len(), "Successfully received DeepSeek response");
        Ok(content)
    }

    fn ensure_configured(&self) -> Result<(), AIError> {
        if self.config.api_key.trim().is_empty() {
            return Err(AIError::MissingCredential(Self::KEY_NAME));
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
