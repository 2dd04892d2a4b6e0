use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::{HighlighterError, HighlighterResult};

/// Shortest string accepted as an API key before any request is made
pub const MIN_API_KEY_LENGTH: usize = 20;

/// One prompt plus the generation parameters it is sent with
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_output_tokens,
        }
    }
}

/// Text-generation backend the analyzer talks to
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one prompt and return the model's raw response text.
    async fn generate(&self, request: &GenerationRequest) -> HighlighterResult<String>;
}

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &AnalyzerConfig) -> HighlighterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Request body for the Gemini generateContent API.
    pub fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
        json!({
            "contents": [{
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "topK": 1,
                "topP": 1,
                "maxOutputTokens": request.max_output_tokens,
            },
        })
    }

    /// Pull `candidates[0].content.parts[0].text` out of a response body.
    pub fn response_text(body: &serde_json::Value) -> HighlighterResult<String> {
        let candidates = body["candidates"]
            .as_array()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| HighlighterError::invalid_response("No results returned from Gemini API"))?;

        let text = candidates[0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| HighlighterError::invalid_response("Invalid response structure from Gemini API"))?;

        if text.trim().is_empty() {
            return Err(HighlighterError::invalid_response("Empty response from Gemini API"));
        }

        Ok(text.to_string())
    }

    /// Check the key with a tiny request. Short keys are rejected locally.
    pub async fn validate_api_key(&self) -> HighlighterResult<()> {
        if self.api_key.trim().len() < MIN_API_KEY_LENGTH {
            return Err(HighlighterError::configuration(
                "Invalid API key format. Please check your Google Gemini API key",
            ));
        }

        let request = GenerationRequest::new("Test", 0.1, 10);
        let response = self.send(&request).await?;
        let status = response.status().as_u16();
        if response.status().is_success() {
            info!("🔑 API key validated");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status, "🔑 API key validation failed");
        debug!("Validation response: {}", body);
        Err(HighlighterError::from_status(status))
    }

    async fn send(&self, request: &GenerationRequest) -> HighlighterResult<reqwest::Response> {
        let body = Self::build_request_body(request);
        debug!(
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            temperature = request.temperature,
            max_output_tokens = request.max_output_tokens,
            "📤 Gemini request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> HighlighterResult<String> {
        let response = self.send(request).await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, "❌ Gemini API error response");
            debug!("Error body: {}", body);
            return Err(HighlighterError::from_status(status));
        }

        let body: serde_json::Value = response.json().await?;
        let text = Self::response_text(&body)?;
        debug!(response_chars = text.chars().count(), "📥 Gemini response");
        Ok(text)
    }
}
