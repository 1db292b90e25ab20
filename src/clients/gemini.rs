use crate::clients::{check_status, parse_data_uri};
use crate::config::KeyFromEnv;
use crate::core::{LowLevelClient, Prompt};
use crate::error::{AIError, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            max_output_tokens: 8192,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl KeyFromEnv for GeminiClient {
    const KEY_NAME: &'static str = "GEMINI_API_KEY";
}

impl Default for GeminiClient {
    /// Reads `GEMINI_API_KEY`; a missing key is reported later by `ensure_configured`.
    fn default() -> Self {
        let config = GeminiConfig {
            api_key: Self::find_key().unwrap_or_default(),
            ..GeminiConfig::default()
        };
        Self::new(config)
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        info!(model = %config.model, "Creating new Gemini client");
        Self { config, client: Client::new() }
    }

    pub fn with_model(mut self, model: String) -> Self {
        info!(model = %model, "Setting Gemini model");
        self.config.model = model;
        self
    }

    fn build_request(&self, prompt: Prompt) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text { text: prompt.user }];
        if let Some(uri) = prompt.image_data_uri.as_deref() {
            match parse_data_uri(uri) {
                Some((mime, data)) => parts.push(GeminiPart::InlineData {
                    inline_data: InlineData { mime_type: mime.to_string(), data: data.to_string() },
                }),
                None => warn!("Ignoring image that is not a base64 data URI"),
            }
        }

        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text { text: prompt.system }],
            },
            contents: vec![GeminiContent { role: Some("user".to_string()), parts }],
            generation_config: GenerationConfig {
                temperature: prompt.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[async_trait]
impl LowLevelClient for GeminiClient {
    #[instrument(skip(self, prompt), fields(prompt = %prompt.name, model = %self.config.model))]
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        debug!(prompt_len = prompt.len(), "Preparing Gemini API request");
        let request = self.build_request(prompt);
        let url = format!("{}/models/{}:generateContent", self.config.base_url, self.config.model);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::Gemini(ProviderError::Http(e.to_string()))
            })?;
        let response = check_status(response, "gemini", AIError::Gemini).await?;

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response JSON");
            AIError::Gemini(ProviderError::Http(e.to_string()))
        })?;

        let text: String = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| {
                error!("No candidates in Gemini response");
                AIError::Gemini(ProviderError::Api("No candidates in response".to_string()))
            })?;

        info!(response_len = text.len(), "Successfully received Gemini response");
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
