//! Incremental translation engine
//!
//! A run has three stages:
//!
//! 1. **Diff** ([`diff`]): compare the source tree with the last persisted
//!    result, grow the result to the source's shape and collect the pending
//!    leaves.
//! 2. **Schedule** ([`scheduler`]): translate pending leaves with at most `K`
//!    calls in flight across the whole tree.
//! 3. **Checkpoint** ([`store`]): after every finished leaf, atomically replace
//!    the result file with the current tree. Leaves still holding source text
//!    are listed next to it so the next run retries them.
//!
//! Re-running on the same inputs only does the work that is still missing.

pub mod diff;
pub mod progress;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod integration_tests;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::parser::read_document;

pub use diff::{Differ, PendingNode, TranslationStatus, classify};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgress, RunSummary, TracingProgress};
pub use scheduler::{DEFAULT_CONCURRENCY, RunOptions, RunReport, Scheduler};
pub use store::{Checkpoint, CheckpointSink, FileStore, StoreError, StoreResult, Untranslated};

/// Translates `source_path` into `result_path`, resuming from whatever the
/// result file already holds.
///
/// An unparseable source or an unwritable destination ends the run with an
/// error. A missing or corrupt result file only means starting from scratch.
pub async fn translate_file(
    source_path: &Path,
    result_path: &Path,
    scheduler: &Scheduler,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let source = read_document(source_path).await?;

    let store = FileStore::new(result_path);
    let existing = store.load_checkpoint().await;

    tracing::info!(
        "translating {} -> {}",
        source_path.display(),
        result_path.display()
    );
    scheduler.run(&source, existing, Arc::new(store), cancel).await
}
