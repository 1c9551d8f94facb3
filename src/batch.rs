//! Mod-folder workflows
//!
//! A mods folder holds many mods, each with its own source file (usually
//! `i18n/default.json`) somewhere below the mod's root. These helpers find
//! every such directory, translate them one after another, or report what is
//! still untranslated without calling the provider.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::detect::SourceLanguageDetector;
use crate::engine::{Differ, FileStore, PendingNode, RunSummary, Scheduler, translate_file};
use crate::error::{ModlocError, Result};
use crate::parser::read_document;

/// File names looked up inside every mod directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModFiles {
    pub source_file: String,
    pub result_file: String,
}

impl Default for ModFiles {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for ModFiles {
    fn from(run: &RunConfig) -> Self {
        Self {
            source_file: run.source_file.clone(),
            result_file: run.result_file.clone(),
        }
    }
}

/// A directory that contains a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModDir {
    /// Path relative to the batch root, `/`-separated; `.` for the root itself.
    pub name: String,
    pub dir: PathBuf,
}

impl ModDir {
    fn new(root: &Path, dir: PathBuf) -> Self {
        let name = dir
            .strip_prefix(root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|| ".".to_string());
        Self { name, dir }
    }

    pub fn source_path(&self, files: &ModFiles) -> PathBuf {
        self.dir.join(&files.source_file)
    }

    pub fn result_path(&self, files: &ModFiles) -> PathBuf {
        self.dir.join(&files.result_file)
    }
}

/// How one mod of a batch ended.
#[derive(Debug)]
pub struct ModOutcome {
    pub name: String,
    pub result: std::result::Result<RunSummary, ModlocError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub mods: Vec<ModOutcome>,
    /// Set when the batch stopped before visiting every mod.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &ModOutcome> {
        self.mods.iter().filter(|m| m.result.is_err())
    }

    pub fn translated(&self) -> usize {
        self.mods
            .iter()
            .filter_map(|m| m.result.as_ref().ok())
            .map(|s| s.translated)
            .sum()
    }
}

/// Finds every directory below `root` (including `root`) that contains
/// `source_file`, sorted by path. Symlinked directories are not followed.
pub async fn discover_mods(root: &Path, source_file: &str) -> Result<Vec<ModDir>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() && entry.file_name() == source_file {
                found.push(dir.clone());
            }
        }
    }

    found.sort();
    Ok(found.into_iter().map(|dir| ModDir::new(root, dir)).collect())
}

/// Translates every mod below `root`, one mod at a time.
///
/// A mod whose source cannot be parsed or whose result cannot be written is
/// recorded as failed and the batch moves on. Cancellation stops the batch
/// after the mod that was running.
pub async fn translate_mods(
    root: &Path,
    files: &ModFiles,
    scheduler: &Scheduler,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    let mods = discover_mods(root, &files.source_file).await?;
    tracing::info!("found {} mods under {}", mods.len(), root.display());

    let mut report = BatchReport::default();
    for m in mods {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        tracing::info!(name = %m.name, "translating mod");
        let result = translate_file(
            &m.source_path(files),
            &m.result_path(files),
            scheduler,
            cancel,
        )
        .await;
        let result = match result {
            Ok(run) => {
                report.cancelled = run.summary.cancelled;
                Ok(run.summary)
            }
            Err(e @ (ModlocError::Parse(_) | ModlocError::Store(_))) => {
                tracing::error!(name = %m.name, "skipping mod: {}", e);
                Err(e)
            }
            Err(e) => return Err(e),
        };
        report.mods.push(ModOutcome {
            name: m.name,
            result,
        });
        if report.cancelled {
            break;
        }
    }
    Ok(report)
}

/// Collects the pending leaves of every mod below `root` without translating
/// anything. Mods with nothing pending are left out; unreadable sources are
/// skipped with a warning.
pub async fn missing_report(
    root: &Path,
    files: &ModFiles,
    detector: &dyn SourceLanguageDetector,
) -> Result<IndexMap<String, PendingNode>> {
    let differ = Differ::new(detector);
    let mut report = IndexMap::new();

    for m in discover_mods(root, &files.source_file).await? {
        let source = match read_document(&m.source_path(files)).await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(name = %m.name, "skipping mod: {}", e);
                continue;
            }
        };
        let mut checkpoint = FileStore::new(m.result_path(files)).load_checkpoint().await;

        if let Some(pending) = differ.resume(&source, &mut checkpoint) {
            tracing::debug!(name = %m.name, leaves = pending.leaf_count(), "pending");
            report.insert(m.name, pending);
        }
    }
    Ok(report)
}
