//! modloc: incremental, checkpointed machine translation of mod configuration
//! files.
//!
//! Given a source tree (usually a mod's `i18n/default.json`) and the result
//! of a previous run, modloc translates only the leaves that are still
//! missing or untranslated, with a global cap on concurrent provider calls,
//! and atomically rewrites the result file after every finished leaf.
//!
//! ```ignore
//! use std::sync::Arc;
//! use modloc::engine::{RunOptions, Scheduler, translate_file};
//! use modloc::mt::{MockMode, MockTranslator, TranslationRequest};
//!
//! let scheduler = Scheduler::new(
//!     Arc::new(MockTranslator::new(MockMode::Suffix)),
//!     RunOptions::new(TranslationRequest::new("Simplified Chinese")),
//! );
//! let report = translate_file(
//!     "i18n/default.json".as_ref(),
//!     "i18n/zh.json".as_ref(),
//!     &scheduler,
//!     &Default::default(),
//! )
//! .await?;
//! println!("{} leaves translated", report.summary.translated);
//! ```

pub mod batch;
pub mod config;
pub mod detect;
pub mod document;
pub mod engine;
pub mod error;
pub mod mt;
pub mod parser;

pub use detect::{AsciiRatioDetector, SourceLanguageDetector};
pub use document::{DocumentNode, NodePath, PathSegment, Scalar};
pub use error::{ModlocError, Result};
pub use parser::{ParseError, parse_document};
