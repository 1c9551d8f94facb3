//! Bounded concurrent scheduler
//!
//! Drains the pending subtree through the translation client.
//!
//! - One `Semaphore` with `K` permits is created per run and shared by every
//!   dispatch, so at most `K` translation calls are in flight across the whole
//!   tree. A permit is held only for the duration of the call.
//! - Translation tasks never touch the result tree. They send their outcome
//!   over a channel to the coordinator, which commits each one (mutate, then
//!   persist) inside a single critical section.
//! - Cancellation is checked before every dispatch; calls already in flight
//!   finish and are committed.
//! - Dispatch and commit run inside the `run` future itself, so dropping it
//!   stops both.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::detect::{AsciiRatioDetector, SourceLanguageDetector};
use crate::document::{DocumentNode, NodePath};
use crate::engine::diff::Differ;
use crate::engine::progress::{ProgressEvent, ProgressSink, RunSummary, TracingProgress};
use crate::engine::store::{Checkpoint, CheckpointSink, StoreResult, Untranslated};
use crate::error::Result;
use crate::mt::{MachineTranslator, TranslationOutcome, TranslationRequest, translate_or_keep};

/// Default number of concurrent translation calls.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub concurrency: NonZeroUsize,
    pub request: TranslationRequest,
}

impl RunOptions {
    pub fn new(request: TranslationRequest) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request,
        }
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The result tree as last persisted.
    pub tree: DocumentNode,
    /// Leaves of `tree` still holding source text; retried by the next run.
    pub untranslated: Untranslated,
    pub summary: RunSummary,
}

/// The run's checkpoint together with where it is persisted.
///
/// Every mutation is followed by a full snapshot write while the lock is
/// still held, so the sequence of snapshots on disk is linearizable.
struct ResultTree {
    state: Mutex<Checkpoint>,
    store: Arc<dyn CheckpointSink>,
}

impl ResultTree {
    fn new(state: Checkpoint, store: Arc<dyn CheckpointSink>) -> Self {
        Self {
            state: Mutex::new(state),
            store,
        }
    }

    async fn commit(&self, path: &NodePath, text: String) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if !state.tree.set(path, DocumentNode::text(text)) {
            tracing::warn!(%path, "result tree has no slot for translated leaf");
        }
        state.untranslated.remove(path);
        self.store.persist(&state).await
    }

    async fn flush(&self) -> StoreResult<()> {
        let state = self.state.lock().await;
        self.store.persist(&state).await
    }

    fn into_inner(self) -> Checkpoint {
        self.state.into_inner()
    }
}

struct Completion {
    path: NodePath,
    source: String,
    outcome: TranslationOutcome,
}

#[derive(Debug, Default)]
struct DispatchStats {
    dispatched: usize,
    cancelled: bool,
}

pub struct Scheduler {
    translator: Arc<dyn MachineTranslator>,
    detector: Arc<dyn SourceLanguageDetector>,
    progress: Arc<dyn ProgressSink>,
    options: RunOptions,
}

impl Scheduler {
    pub fn new(translator: Arc<dyn MachineTranslator>, options: RunOptions) -> Self {
        Self {
            translator,
            detector: Arc::new(AsciiRatioDetector::default()),
            progress: Arc::new(TracingProgress),
            options,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn SourceLanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Translates every pending leaf of `source` into `existing`, persisting a
    /// snapshot to `store` after each completed leaf.
    ///
    /// Errors only when the store cannot be prepared or the opening/closing
    /// snapshot cannot be written; translation and per-leaf checkpoint
    /// failures are reported through the progress sink.
    ///
    /// Dropping the returned future aborts every call still in flight and
    /// dispatches nothing more.
    pub async fn run(
        &self,
        source: &DocumentNode,
        existing: Checkpoint,
        store: Arc<dyn CheckpointSink>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let mut state = existing;
        let pending = Differ::new(self.detector.as_ref()).resume(source, &mut state);
        let leaves = pending.map(|p| p.leaves()).unwrap_or_default();

        store.prepare().await?;
        let result = ResultTree::new(state, store);
        // the grown tree goes to disk before any call is made
        result.flush().await?;

        tracing::debug!(
            pending = leaves.len(),
            concurrency = self.options.concurrency.get(),
            provider = self.translator.provider_name(),
            "starting run"
        );

        let total = leaves.len();
        let gate = Arc::new(Semaphore::new(self.options.concurrency.get()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = dispatch(
            leaves,
            gate,
            self.translator.clone(),
            self.options.request.clone(),
            tx,
            cancel.clone(),
        );

        let coordinator = async {
            let mut summary = RunSummary {
                pending: total,
                ..RunSummary::default()
            };
            while let Some(Completion {
                path,
                source,
                outcome,
            }) = rx.recv().await
            {
                match outcome.failure {
                    None => {
                        summary.translated += 1;
                        let commit = result.commit(&path, outcome.text.clone()).await;
                        self.progress.report(ProgressEvent::Translated {
                            path: path.clone(),
                            before: source,
                            after: outcome.text,
                        });
                        if let Err(e) = commit {
                            summary.checkpoint_failures += 1;
                            self.progress.report(ProgressEvent::CheckpointFailed {
                                path,
                                error: e.to_string(),
                            });
                        }
                    }
                    Some(kind) => {
                        summary.failed += 1;
                        self.progress
                            .report(ProgressEvent::Failed { path, source, kind });
                    }
                }
            }
            summary
        };

        let (stats, mut summary) = tokio::join!(dispatcher, coordinator);
        summary.dispatched = stats.dispatched;
        summary.cancelled = stats.cancelled;

        result.flush().await?;
        self.progress.report(ProgressEvent::Finished(summary));

        let Checkpoint { tree, untranslated } = result.into_inner();
        Ok(RunReport {
            tree,
            untranslated,
            summary,
        })
    }
}

/// Spawns one translation task per leaf, in order, each behind a permit from
/// the run-wide `gate`. Returns once every spawned task has finished; if
/// dropped before that, the `JoinSet` aborts the tasks still running.
async fn dispatch(
    leaves: Vec<(NodePath, String)>,
    gate: Arc<Semaphore>,
    translator: Arc<dyn MachineTranslator>,
    request: TranslationRequest,
    tx: mpsc::UnboundedSender<Completion>,
    cancel: CancellationToken,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    let mut tasks = JoinSet::new();

    for (path, text) in leaves {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = gate.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            stats.cancelled = cancel.is_cancelled();
            break;
        };

        stats.dispatched += 1;
        let translator = translator.clone();
        let request = request.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let outcome = translate_or_keep(translator.as_ref(), &text, &request).await;
            drop(permit);
            // the coordinator only stops listening once every sender is gone
            let _ = tx.send(Completion {
                path,
                source: text,
                outcome,
            });
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("translation task failed: {}", e);
        }
    }
    stats
}
