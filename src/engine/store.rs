//! Checkpointed persistence for result trees.
//!
//! # Atomic Writes
//!
//! Every checkpoint is written to `<file>.tmp` next to the target, flushed to
//! disk, then renamed over the target. A reader therefore sees either the
//! previous complete snapshot or the new one, never a partial file, and a
//! failed write leaves the previous snapshot in place.
//!
//! # Untranslated Leaves
//!
//! Leaves that have not been translated yet hold their source text in the
//! result file, so the result is always complete. Their paths are kept in a
//! `<file>.pending` list next to it; the next run reads that list back and
//! treats those leaves as missing, however the detector would classify their
//! text. The list is deleted once it is empty.
//!
//! The two files cannot be replaced together. When the list grows it is
//! written before the tree, when it shrinks after it, so an interrupted write
//! can only leave the list naming too many leaves. A listed leaf whose text
//! no longer matches its source is done anyway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::document::{DocumentNode, NodePath};
use crate::parser::read_document;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize result tree: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Paths of result leaves that still hold untranslated source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Untranslated(BTreeSet<NodePath>);

impl Untranslated {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: NodePath) -> bool {
        self.0.insert(path)
    }

    pub fn remove(&mut self, path: &NodePath) -> bool {
        self.0.remove(path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.0.contains(path)
    }

    pub fn is_subset(&self, other: &Untranslated) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodePath> {
        self.0.iter()
    }
}

impl FromIterator<NodePath> for Untranslated {
    fn from_iter<I: IntoIterator<Item = NodePath>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A result tree together with the leaves in it that are not translated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub tree: DocumentNode,
    pub untranslated: Untranslated,
}

impl Checkpoint {
    /// A checkpoint of a tree with nothing known to be untranslated.
    pub fn new(tree: DocumentNode) -> Self {
        Self {
            tree,
            untranslated: Untranslated::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(DocumentNode::empty_mapping())
    }
}

/// Durable destination for result-tree snapshots.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    /// Makes the destination writable (creates directories). Idempotent.
    async fn prepare(&self) -> StoreResult<()>;

    /// Replaces the stored snapshot with `checkpoint`.
    async fn persist(&self, checkpoint: &Checkpoint) -> StoreResult<()>;
}

/// A result file on the local filesystem.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Untranslated list as last written by this store.
    written: Mutex<Option<Untranslated>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file>.pending`, next to the result file.
    pub fn untranslated_path(&self) -> PathBuf {
        sibling(&self.path, ".pending")
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Loads the previous result.
    ///
    /// - **Missing file** returns `None`.
    /// - **Unreadable or corrupt file** returns `None` with a warning; the run
    ///   then starts from an empty result.
    pub async fn load(&self) -> Option<DocumentNode> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!("no previous result at {}", self.path.display());
            return None;
        }
        match read_document(&self.path).await {
            Ok(tree) => Some(tree),
            Err(e) => {
                tracing::warn!("ignoring unreadable result, starting empty: {}", e);
                None
            }
        }
    }

    /// Loads the untranslated list; missing or unreadable means empty.
    pub async fn load_untranslated(&self) -> Untranslated {
        let path = self.untranslated_path();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Untranslated::new(),
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {}", path.display(), e);
                return Untranslated::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!("ignoring corrupt {}: {}", path.display(), e);
            Untranslated::new()
        })
    }

    /// Loads the previous result and its untranslated list. A missing or
    /// corrupt result starts from an empty tree.
    pub async fn load_checkpoint(&self) -> Checkpoint {
        let Some(tree) = self.load().await else {
            return Checkpoint::empty();
        };
        Checkpoint {
            tree,
            untranslated: self.load_untranslated().await,
        }
    }

    async fn write_atomic(&self, target: &Path, contents: &[u8]) -> StoreResult<()> {
        let temp = sibling(target, ".tmp");
        let write = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(contents).await?;
            file.sync_all().await?;
            Ok::<(), io::Error>(())
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Self::io_error(&temp, e));
        }

        tokio::fs::rename(&temp, target)
            .await
            .map_err(|e| Self::io_error(target, e))
    }

    async fn write_tree(&self, tree: &DocumentNode) -> StoreResult<()> {
        let mut json = tree.to_pretty_json()?;
        json.push('\n');
        self.write_atomic(&self.path, json.as_bytes()).await
    }

    async fn write_untranslated(&self, untranslated: &Untranslated) -> StoreResult<()> {
        let path = self.untranslated_path();
        if untranslated.is_empty() {
            return match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Self::io_error(&path, e)),
                _ => Ok(()),
            };
        }
        let mut json = serde_json::to_string(untranslated)?;
        json.push('\n');
        self.write_atomic(&path, json.as_bytes()).await
    }

    fn last_written(&self) -> Option<Untranslated> {
        match self.written.lock() {
            Ok(written) => written.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn remember(&self, untranslated: &Untranslated) {
        let mut written = match self.written.lock() {
            Ok(written) => written,
            Err(poisoned) => poisoned.into_inner(),
        };
        *written = Some(untranslated.clone());
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("result"));
    name.push(suffix);
    path.with_file_name(name)
}

#[async_trait]
impl CheckpointSink for FileStore {
    async fn prepare(&self) -> StoreResult<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Self::io_error(dir, e)),
            _ => Ok(()),
        }
    }

    async fn persist(&self, checkpoint: &Checkpoint) -> StoreResult<()> {
        let shrinking = self
            .last_written()
            .is_some_and(|last| checkpoint.untranslated.is_subset(&last));

        if shrinking {
            self.write_tree(&checkpoint.tree).await?;
            self.write_untranslated(&checkpoint.untranslated).await?;
        } else {
            self.write_untranslated(&checkpoint.untranslated).await?;
            self.write_tree(&checkpoint.tree).await?;
        }
        self.remember(&checkpoint.untranslated);
        Ok(())
    }
}
