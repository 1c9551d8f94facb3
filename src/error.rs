use thiserror::Error;

use crate::engine::store::StoreError;
use crate::parser::ParseError;

/// Top-level error type for modloc.
///
/// Only conditions that end a run surface here. Per-leaf translation failures
/// never do; they are reported through the progress sink instead.
#[derive(Debug, Error)]
pub enum ModlocError {
    /// The source document could not be parsed.
    #[error("source format error: {0}")]
    Parse(#[from] ParseError),

    /// The result location could not be prepared or the final write failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error outside the result store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModlocError>;
