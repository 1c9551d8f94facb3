//! Mock Machine Translator for testing
//!
//! A deterministic, API-free translator for exercising the engine without an
//! API key or network access. It also counts calls and the peak number of
//! calls in flight, which is what the concurrency tests assert against.
//!
//! # Example
//!
//! ```ignore
//! use modloc::mt::{MachineTranslator, MockTranslator, MockMode, TranslationRequest};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate("hello", &TranslationRequest::new("fr")).await.unwrap();
//!     assert_eq!(result, "hello_fr");
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TranslationRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append target suffix: "hello" → "hello_fr"
    Suffix,

    /// Use predefined mappings, falling back to `Suffix`
    /// (text, target_language) → translation
    Mappings(HashMap<(String, String), String>),

    /// Every call fails with a service error
    Error(String),

    /// Only the listed inputs fail; everything else behaves like `Suffix`
    FailOn(HashSet<String>),

    /// Answer with an empty string
    Blank,

    /// No-op: return input unchanged
    NoOp,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Mock translator that simulates various translation scenarios
///
/// Clones share their counters.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    counters: Arc<Counters>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Create a MockTranslator with simulated network delay
    ///
    /// ```ignore
    /// let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
    /// // Each translation will take ~50ms
    /// ```
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Number of `translate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target)))
            }
            MockMode::Error(msg) => Err(MtError::Service(msg.clone())),
            MockMode::FailOn(failing) if failing.contains(text) => {
                Err(MtError::Service(format!("refused: {}", text)))
            }
            MockMode::FailOn(_) => Ok(format!("{}_{}", text, target)),
            MockMode::Blank => Ok(String::new()),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

/// Decrements the in-flight counter when a call ends, however it ends.
struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(&self, text: &str, request: &TranslationRequest) -> MtResult<String> {
        let _guard = InFlight::enter(&self.counters);
        self.apply_delay().await;
        self.apply_translation(text, &request.target_language)
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
