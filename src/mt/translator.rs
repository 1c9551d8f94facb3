//! Machine translation trait and the fail-soft call boundary
//!
//! `MachineTranslator` is the seam between the engine and a concrete provider
//! (an OpenAI-compatible chat endpoint, the mock). Providers report failures
//! as `MtError`; the engine never sees them directly; it goes through
//! [`translate_or_keep`], which turns every failure into "keep the original
//! text" plus a classification for progress reporting.
//!
//! # Example
//!
//! ```ignore
//! use modloc::mt::{MachineTranslator, OpenAiTranslator, TranslationRequest, translate_or_keep};
//!
//! let provider = OpenAiTranslator::from_env()?;
//! let request = TranslationRequest::new("Simplified Chinese");
//! let outcome = translate_or_keep(&provider, "Hello, $1!", &request).await;
//! println!("{}", outcome.text); // translated, or "Hello, $1!" on failure
//! ```

use crate::mt::error::{FailureKind, MtError, MtResult};
use async_trait::async_trait;

/// What to translate into, and optionally with which model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Human-readable target language, e.g. "Simplified Chinese"
    pub target_language: String,
    /// Overrides the provider's configured model for this call
    pub model_hint: Option<String>,
}

impl TranslationRequest {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            model_hint: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }
}

/// Generic trait for machine translation providers
///
/// Implementations do the actual I/O. They may fail; callers that must not
/// fail use [`translate_or_keep`].
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text string
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The translated text
    /// * `Err(MtError)` - If translation fails
    async fn translate(&self, text: &str, request: &TranslationRequest) -> MtResult<String>;

    /// Name used in logs to identify which provider handled a translation.
    fn provider_name(&self) -> &str;
}

/// Result of a fail-soft translation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    /// Translated text, or the original when the call failed
    pub text: String,
    pub failure: Option<FailureKind>,
}

impl TranslationOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Translates `text`, falling back to the original text on any failure.
///
/// Blank input is returned as is without calling the provider. A blank answer
/// for non-blank input counts as a `Response` failure.
pub async fn translate_or_keep<T>(
    translator: &T,
    text: &str,
    request: &TranslationRequest,
) -> TranslationOutcome
where
    T: MachineTranslator + ?Sized,
{
    if text.trim().is_empty() {
        return TranslationOutcome {
            text: text.to_string(),
            failure: None,
        };
    }

    let result = translator
        .translate(text, request)
        .await
        .and_then(|translated| {
            if translated.trim().is_empty() {
                Err(MtError::Response("empty translation".to_string()))
            } else {
                Ok(translated)
            }
        });

    match result {
        Ok(translated) => TranslationOutcome {
            text: translated,
            failure: None,
        },
        Err(e) => {
            tracing::warn!(
                provider = translator.provider_name(),
                kind = %e.kind(),
                "translation failed, keeping original: {}",
                e
            );
            TranslationOutcome {
                text: text.to_string(),
                failure: Some(e.kind()),
            }
        }
    }
}

/// Validate that a language label is usable in a prompt.
///
/// Accepts letters (any script), digits, spaces, hyphens, underscores and
/// parentheses, e.g. `zh-Hans`, `Simplified Chinese`, `Português (Brasil)`.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.trim().is_empty() {
        return Err(MtError::InvalidLocale(
            "Target language is empty".to_string(),
        ));
    }

    if !locale
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '(' | ')'))
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in target language: {}",
            locale
        )));
    }

    Ok(())
}
