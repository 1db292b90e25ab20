use crate::clients::{check_status, parse_data_uri};
use crate::config::KeyFromEnv;
use crate::core::{LowLevelClient, Prompt};
use crate::error::{AIError, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: Vec<ClaudeContentBlock>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

/// Configuration for the Claude client
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 8192,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClaudeClient {
    config: ClaudeConfig,
    client: Client,
}

impl KeyFromEnv for ClaudeClient {
    const KEY_NAME: &'static str = "ANTHROPIC_API_KEY";
}

impl Default for ClaudeClient {
    fn default() -> Self {
        let config = ClaudeConfig {
            api_key: Self::find_key().unwrap_or_default(),
            ..ClaudeConfig::default()
        };
        Self::new(config)
    }
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Self {
        info!(model = %config.model, "Creating new Claude client");
        Self { config, client: Client::new() }
    }

    pub fn with_model(mut self, model: String) -> Self {
        info!(model = %model, "Setting Claude model");
        self.config.model = model;
        self
    }

    fn build_request(&self, prompt: Prompt) -> ClaudeRequest {
        let mut content = Vec::new();
        if let Some(uri) = prompt.image_data_uri.as_deref() {
            match parse_data_uri(uri) {
                Some((mime, data)) => content.push(ClaudeContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: mime.to_string(),
                        data: data.to_string(),
                    },
                }),
                None => warn!("Ignoring image that is not a base64 data URI"),
            }
        }
        content.push(ClaudeContentBlock::Text { text: prompt.user });

        ClaudeRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: prompt.temperature,
            system: vec![ClaudeContentBlock::Text { text: prompt.system }],
            messages: vec![ClaudeMessage { role: "user".to_string(), content }],
        }
    }
}

#[async_trait]
impl LowLevelClient for ClaudeClient {
    #[instrument(skip(self, prompt), fields(prompt = %prompt.name, model = %self.config.model))]
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        debug!(prompt_len = prompt.len(), "Preparing Claude API request");
        let request = self.build_request(prompt);

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::Claude(ProviderError::Http(e.to_string()))
            })?;
        let response = check_status(response, "claude", AIError::Claude).await?;

        let claude_response: ClaudeResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Claude response JSON");
            AIError::Claude(ProviderError::Http(e.to_string()))
        })?;

        debug!(content_count = claude_response.content.len(), "Parsed Claude response");

        let text: String = claude_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            error!("No text content in Claude response");
            return Err(AIError::Claude(ProviderError::Api("No content in response".to_string())));
        }

        info!(response_len = text.len(), "Successfully received Claude response");
        Ok(text)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_user_turns_are_plain_text_blocks() {
        let client = ClaudeClient::new(ClaudeConfig { api_key: "k".into(), ..ClaudeConfig::default() });
        let system = "Request ID: 42. ".repeat(500);
        let body = serde_json::to_value(client.build_request(Prompt::new("p", system.clone(), "user turn"))).unwrap();

        assert_eq!(body["system"][0]["type"], "text");
        assert_eq!(body["system"][0]["text"], system.as_str());
        assert!(body["system"][0].get("cache_control").is_none());
        assert_eq!(body["messages"][0]["content"][0]["text"], "user turn");
    }

    #[test]
    fn image_block_precedes_text() {
        let client = ClaudeClient::new(ClaudeConfig { api_key: "k".into(), ..ClaudeConfig::default() });
        let prompt = Prompt::new("p", "s", "u").with_image(Some("data:image/png;base64,AAAA".into()));
        let body = serde_json::to_value(client.build_request(prompt)).unwrap();

        assert_eq!(body["messages"][0]["content"][0]["type"], "image");
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(body["messages"][0]["content"][1]["type"], "text");
    }
}
