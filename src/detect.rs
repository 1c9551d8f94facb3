//! Source-language detection
//!
//! Decides whether a string still reads as untranslated source text. The diff
//! engine only re-queues a result leaf that is identical to its source when the
//! detector says the text is still in the source language; identical text in
//! any other script (names, numbers, already-localized strings) counts as done.

use regex::Regex;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]").expect("valid regex"));

/// Classifies text as still being in the untranslated source language.
pub trait SourceLanguageDetector: Send + Sync {
    fn is_untranslated(&self, text: &str) -> bool;
}

/// Treats text as English when ASCII letters make up more than `threshold` of
/// its word characters (punctuation and whitespace ignored).
#[derive(Debug, Clone, Copy)]
pub struct AsciiRatioDetector {
    threshold: f64,
}

impl AsciiRatioDetector {
    pub const DEFAULT_THRESHOLD: f64 = 0.9;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Share of ASCII letters among word characters, `None` when there are none.
    pub fn ascii_ratio(text: &str) -> Option<f64> {
        let clean = NON_WORD.replace_all(text, "");
        let total = clean.chars().count();
        if total == 0 {
            return None;
        }
        let ascii_letters = clean.chars().filter(|c| c.is_ascii_alphabetic()).count();
        Some(ascii_letters as f64 / total as f64)
    }
}

impl Default for AsciiRatioDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl SourceLanguageDetector for AsciiRatioDetector {
    fn is_untranslated(&self, text: &str) -> bool {
        Self::ascii_ratio(text).is_some_and(|ratio| ratio > self.threshold)
    }
}
