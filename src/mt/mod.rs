/// Machine Translation Module
///
/// The translation client boundary used by the engine. A provider turns one
/// source string into one translated string; [`translate_or_keep`] wraps every
/// call so a failing provider never aborts a run: the leaf keeps its original
/// text and the failure is reported, to be retried on the next run.
///
/// # Providers
///
/// 1. **OpenAiTranslator** - any OpenAI-compatible chat completion endpoint
/// 2. **MockTranslator** - deterministic, offline; used by tests and `--mock`
///
/// # Example
///
/// ```ignore
/// use modloc::mt::{MockMode, MockTranslator, TranslationRequest, translate_or_keep};
///
/// let mock = MockTranslator::new(MockMode::Suffix);
/// let outcome = translate_or_keep(&mock, "Hello", &TranslationRequest::new("fr")).await;
/// assert_eq!(outcome.text, "Hello_fr");
/// ```
pub mod error;
pub mod mock;
pub mod openai;
pub mod translator;

pub use error::{FailureKind, MtError, MtResult};
pub use mock::{MockMode, MockTranslator};
pub use openai::OpenAiTranslator;
pub use translator::{
    MachineTranslator, TranslationOutcome, TranslationRequest, translate_or_keep, validate_locale,
};
