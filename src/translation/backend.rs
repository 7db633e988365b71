/*!
 * Translation backend seam.
 *
 * A backend turns one numbered block into translated text. Every call is
 * bounded by its own timeout; a failed or timed out call is reported as
 * `BackendUnavailable` and only affects the batch that issued it.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::app_config::BackendConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::LanguagePreference;
use crate::providers::Provider;
use crate::providers::ollama::{GenerationRequest, Ollama};

use super::batch::build_prompt;

/// Anything able to translate a numbered block
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `[n] text` lines; the response is aligned by the caller
    async fn translate_block(&self, numbered_text: &str) -> Result<String, TranslationError>;

    /// Whether the service answers and has the configured model
    async fn is_ready(&self) -> bool;

    /// Name shown in logs
    fn name(&self) -> String {
        "backend".to_string()
    }
}

// @struct: Ollama `/api/generate` backend
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Ollama,
    probe: Ollama,
    model: String,
    temperature: f32,
    num_predict: u32,
    call_timeout: Duration,
    probe_timeout: Duration,
    source_language: String,
    target_language: String,
}

impl OllamaBackend {
    pub fn new(
        config: &BackendConfig,
        source: &LanguagePreference,
        target: &LanguagePreference,
    ) -> Self {
        Self {
            client: Ollama::new_with_config(
                &config.endpoint,
                config.timeout(),
                config.retry_count,
                config.retry_backoff_ms,
            ),
            probe: Ollama::from_url(&config.endpoint, config.probe_timeout()),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
            call_timeout: config.timeout(),
            probe_timeout: config.probe_timeout(),
            source_language: source.name().to_string(),
            target_language: target.name().to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Version reported by the service, for diagnostics
    pub async fn version(&self) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.probe_timeout, self.probe.version()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.probe_timeout.as_secs())),
        }
    }

    fn request_for(&self, numbered_text: &str) -> GenerationRequest {
        let prompt = build_prompt(numbered_text, &self.source_language, &self.target_language);
        GenerationRequest::new(&self.model, prompt)
            .temperature(self.temperature)
            .num_predict(self.num_predict)
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    async fn translate_block(&self, numbered_text: &str) -> Result<String, TranslationError> {
        let request = self.request_for(numbered_text);

        let response = tokio::time::timeout(self.call_timeout, self.client.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.call_timeout.as_secs()))??;

        let text = Ollama::extract_text(&response);
        debug!(
            "Backend answered with {} chars ({} tokens)",
            text.len(),
            response.eval_count.unwrap_or(0)
        );

        // An empty answer keeps the source lines
        if text.is_empty() {
            return Ok(numbered_text.to_string());
        }
        Ok(text)
    }

    async fn is_ready(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.probe.has_model(&self.model)).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                warn!("Ollama is up but model '{}' is not installed", self.model);
                false
            }
            Ok(Err(e)) => {
                warn!("Ollama is not available: {}", e);
                false
            }
            Err(_) => {
                warn!("Ollama probe timed out after {:?}", self.probe_timeout);
                false
            }
        }
    }

    fn name(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
