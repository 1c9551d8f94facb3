//! Progress reporting for translation runs.

use std::sync::Mutex;

use crate::document::NodePath;
use crate::mt::FailureKind;

/// Counts for a finished (or cancelled) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pending: usize,
    pub dispatched: usize,
    pub translated: usize,
    pub failed: usize,
    pub checkpoint_failures: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// Leaves that are still untranslated after this run.
    pub fn remaining(&self) -> usize {
        self.pending.saturating_sub(self.translated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A leaf was translated and committed to the result tree.
    Translated {
        path: NodePath,
        before: String,
        after: String,
    },
    /// The translation call failed; the leaf keeps its source text.
    Failed {
        path: NodePath,
        source: String,
        kind: FailureKind,
    },
    /// The leaf was committed in memory but its checkpoint write failed.
    CheckpointFailed { path: NodePath, error: String },
    Finished(RunSummary),
}

/// Receives progress events. Called from the run's coordinator, one event at
/// a time.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Translated { path, before, after } => {
                tracing::info!(%path, "{} -> {}", before, after);
            }
            ProgressEvent::Failed { path, source, kind } => {
                tracing::warn!(%path, %kind, "left untranslated: {}", source);
            }
            ProgressEvent::CheckpointFailed { path, error } => {
                tracing::error!(%path, "checkpoint failed: {}", error);
            }
            ProgressEvent::Finished(summary) => {
                tracing::info!(
                    translated = summary.translated,
                    failed = summary.failed,
                    remaining = summary.remaining(),
                    cancelled = summary.cancelled,
                    "run finished"
                );
            }
        }
    }
}

/// Keeps every event in memory, for tests and callers that render their own UI.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
