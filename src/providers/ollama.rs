use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use super::Provider;

/// Ollama client for interacting with Ollama API
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

/// Installed model as listed by `/api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: None,
            stream: Some(false),
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Cap the number of generated tokens
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

impl Ollama {
    /// Create a new Ollama client from a complete URL
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new_with_config(url, timeout, 0, 1000)
    }

    /// Create a new Ollama client with retry configuration
    ///
    /// Ollama uses HTTP/1.1, connections are kept alive between batches.
    pub fn new_with_config(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        let base_url = url.into().trim_end_matches('/').to_string();

        Self {
            base_url,
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            max_retries,
            backoff_base_ms,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await?;
                        return parse_generation_body(&body);
                    }

                    let error_text = response.text().await
                        .unwrap_or_else(|_| "Failed to get error response text".to_string());
                    let api_error = ProviderError::ApiError {
                        status_code: status.as_u16(),
                        message: error_text,
                    };

                    if !status.is_server_error() {
                        // Client error - don't retry
                        error!("Ollama API error: {}", api_error);
                        return Err(api_error);
                    }

                    error!("Ollama API error: {} - attempt {}/{}", api_error, attempt + 1, self.max_retries + 1);
                    last_error = Some(api_error);
                }
                Err(e) => {
                    let e = ProviderError::from(e);
                    error!("Ollama API network error: {} - attempt {}/{}", e, attempt + 1, self.max_retries + 1);
                    last_error = Some(e);
                }
            }

            attempt += 1;

            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!("Ollama API request failed after {} attempts", self.max_retries + 1))
        }))
    }

    /// List installed models
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }

    /// Whether a model whose name contains `model` is installed
    pub async fn has_model(&self, model: &str) -> Result<bool, ProviderError> {
        let models = self.list_models().await?;
        debug!("Ollama reports {} installed model(s)", models.len());
        Ok(models.iter().any(|m| m.name.contains(model)))
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self.client.get(&url).send().await?.json().await?;

        response["version"]
            .as_str()
            .map(|v| v.to_string())
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = GenerationRequest;
    type Response = GenerationResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        self.generate(&request).await
    }

    fn extract_text(response: &Self::Response) -> String {
        response.response.trim().to_string()
    }
}

/// Parse a `/api/generate` body.
///
/// A single JSON object is expected with `stream: false`; a JSONL stream is
/// also accepted and its `response` pieces are concatenated.
pub fn parse_generation_body(body: &str) -> Result<GenerationResponse, ProviderError> {
    match serde_json::from_str::<GenerationResponse>(body) {
        Ok(response) => Ok(response),
        Err(e) => {
            let preview: String = body.chars().take(500).collect();
            debug!("Ollama body is not a single object ({}), trying JSONL: {}", e, preview);

            let mut full_response = String::new();
            let mut last: Option<GenerationResponse> = None;
            for line in body.lines().filter(|l| !l.trim().is_empty()) {
                if let Ok(piece) = serde_json::from_str::<GenerationResponse>(line) {
                    full_response.push_str(&piece.response);
                    last = Some(piece);
                }
            }

            match last {
                Some(mut final_piece) => {
                    final_piece.response = full_response;
                    final_piece.done = true;
                    Ok(final_piece)
                }
                None => Err(ProviderError::ParseError(format!(
                    "Failed to parse Ollama API response: {}. Response contains invalid JSON.",
                    e
                ))),
            }
        }
    }
}
