//! OpenAI-compatible chat completion provider
//!
//! Works with OpenAI's API and any endpoint that speaks the same
//! `/chat/completions` protocol (proxies, self-hosted gateways).
//!
//! # Authentication
//!
//! `from_env` reads the key from `MODLOC_API_KEY` (falling back to `TOKEN`)
//! and the endpoint from `MODLOC_BASE_URL` (falling back to `BASE_URL`).
//!
//! # Example
//!
//! ```ignore
//! use modloc::mt::{MachineTranslator, OpenAiTranslator, TranslationRequest};
//!
//! let provider = OpenAiTranslator::from_env()?;
//! let result = provider
//!     .translate("Hello, $1!", &TranslationRequest::new("Simplified Chinese"))
//!     .await?;
//! ```

use crate::config::TranslatorConfig;
use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TranslationRequest, validate_locale};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// OpenAI-compatible translation provider.
#[derive(Clone)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Names the game in the system prompt, e.g. "Stardew Valley"
    game: String,
}

impl OpenAiTranslator {
    /// Longest text sent in a single request; longer leaves fail softly.
    const MAX_CHARS_PER_STRING: usize = 30_000;

    /// Create from config values.
    pub fn from_config(config: &TranslatorConfig) -> MtResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MtError::Config("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MtError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            game: config.game.clone(),
        })
    }

    /// Create from defaults plus environment overrides.
    pub fn from_env() -> MtResult<Self> {
        let mut config = TranslatorConfig::default();
        config.apply_env();
        Self::from_config(&config)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// System prompt for one target language.
pub fn build_system_prompt(game: &str, target_language: &str) -> String {
    format!(
        "You are a professional game localization translator for {game}. \
         Translate the user's text into natural, fluent {target_language}, keeping the \
         tone and style of the original and the conventions of in-game text. \
         Leave special tokens exactly as they are: positional markers such as $1 or $2, \
         template tokens such as {{{{name}}}}, and control characters such as @, ^ and #. \
         Reply with the translation only, without explanations or notes."
    )
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

impl ChatCompletionResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.trim())
    }
}

impl std::fmt::Debug for OpenAiTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTranslator")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for OpenAiTranslator {
    async fn translate(&self, text: &str, request: &TranslationRequest) -> MtResult<String> {
        validate_locale(&request.target_language)?;

        if text.chars().count() > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::Request(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }

        let model = request.model_hint.as_deref().unwrap_or(&self.model);
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(&self.game, &request.target_language),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
        };

        let url = self.endpoint();
        let start = Instant::now();
        debug!("openai: POST {url} model={model}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                MtError::Request(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::Service(format!("API server error ({}): {}", status, error_text))
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| MtError::Response(format!("Failed to parse API response: {}", e)))?;

        let translated = parsed
            .first_content()
            .ok_or_else(|| MtError::Response("missing 'choices[0].message'".to_string()))?
            .to_string();

        debug!(
            "openai: {} chars -> {} chars in {}ms",
            text.chars().count(),
            translated.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(translated)
    }

    fn provider_name(&self) -> &str {
        "OpenAI-compatible"
    }
}
