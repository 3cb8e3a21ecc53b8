//! The storage provider contract.
//!
//! Callers hold an `Arc<dyn StorageProvider>` and never learn whether a
//! project lives on disk or in the cloud. All paths are API paths: a leading
//! `/`, relative to the project root.

use std::sync::Arc;

use async_trait::async_trait;
use folio_types::{Commit, FileEntry, GitStatus, PullResult};

use crate::backends::{CloudStorageProvider, LocalStorageProvider};
use crate::blob::{FsBlobStore, MemoryBlobStore, S3ContentStore};
use crate::config::{FolioConfig, StorageMode, extension_of};
use crate::error::{StorageError, StorageResult};
use crate::ledger::PendingLedger;

/// Filters applied by [`StorageProvider::list_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include names starting with `.`.
    pub show_hidden: bool,
    /// Lowercase extensions without the dot. Empty means no filter.
    /// Directories are never filtered by extension.
    pub extensions: Vec<String>,
}

impl ListOptions {
    pub fn with_hidden(mut self) -> Self {
        self.show_hidden = true;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Whether an entry with this name and kind survives the filters.
    pub fn accepts(&self, name: &str, is_dir: bool) -> bool {
        if !self.show_hidden && name.starts_with('.') {
            return false;
        }
        if is_dir || self.extensions.is_empty() {
            return true;
        }
        match extension_of(name) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Arguments to [`StorageProvider::log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub limit: usize,
    /// Restrict history to one path.
    pub path: Option<String>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            path: None,
        }
    }
}

/// File operations plus version-control operations over one project.
///
/// Both implementations must be observably equivalent for the file
/// operations; version-control operations may answer
/// [`StorageError::Unsupported`] where a backend has no equivalent.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    // ========================================================================
    // Files
    // ========================================================================

    /// Immediate children of a directory, directories first then by name.
    async fn list_directory(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> StorageResult<Vec<FileEntry>>;

    /// A document's text.
    async fn read_file(&self, path: &str) -> StorageResult<String>;

    async fn write_file(&self, path: &str, content: &str) -> StorageResult<()>;

    /// Remove a file (or, locally, a directory tree).
    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    async fn create_directory(&self, path: &str) -> StorageResult<()>;

    async fn rename(&self, old_path: &str, new_path: &str) -> StorageResult<()>;

    /// Path existence. Traversal attempts are errors, never `false`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    // ========================================================================
    // Version control
    // ========================================================================

    async fn status(&self) -> StorageResult<GitStatus>;

    async fn log(&self, options: &LogOptions) -> StorageResult<Vec<Commit>>;

    async fn add(&self, paths: &[String]) -> StorageResult<()>;

    /// Record a commit, returning its sha.
    async fn commit(&self, message: &str) -> StorageResult<String>;

    async fn push(&self) -> StorageResult<()>;

    async fn pull(&self) -> StorageResult<PullResult>;

    /// Throw away uncommitted changes to one path.
    async fn restore(&self, path: &str) -> StorageResult<()>;

    async fn get_current_branch(&self) -> StorageResult<String>;

    async fn get_remote_url(&self) -> StorageResult<Option<String>>;
}

/// Build the provider a configuration describes.
///
/// Cloud mode uses a directory-backed blob store when `blob_root` is set and
/// an ephemeral in-memory one otherwise; likewise for the ledger database.
pub fn open_provider(config: &FolioConfig) -> StorageResult<Arc<dyn StorageProvider>> {
    match config.mode {
        StorageMode::Local => {
            let root = config
                .root
                .clone()
                .ok_or_else(|| StorageError::config("local mode requires `root`"))?;
            Ok(Arc::new(LocalStorageProvider::with_config(
                root,
                config.storage.clone(),
            )))
        }
        StorageMode::Cloud => Ok(Arc::new(open_cloud_provider(config)?)),
    }
}

/// Build a cloud provider directly, for callers that need the reconciliation
/// operations that aren't on the trait.
pub fn open_cloud_provider(config: &FolioConfig) -> StorageResult<CloudStorageProvider> {
    let cloud = &config.cloud;
    let project_id = cloud
        .project_id
        .ok_or_else(|| StorageError::config("cloud mode requires `cloud.project_id`"))?;
    let user_id = cloud
        .user_id
        .ok_or_else(|| StorageError::config("cloud mode requires `cloud.user_id`"))?;

    let content = match &cloud.blob_root {
        Some(root) => S3ContentStore::new(Arc::new(FsBlobStore::open(root)?)),
        None => S3ContentStore::new(Arc::new(MemoryBlobStore::new())),
    };
    let ledger = match &cloud.database {
        Some(path) => PendingLedger::open(path)?,
        None => PendingLedger::in_memory()?,
    };

    Ok(CloudStorageProvider::new(
        Arc::new(content),
        Arc::new(ledger),
        project_id,
        user_id,
    )
    .with_branch(cloud.branch.clone())
    .with_remote_url(cloud.remote_url.clone())
    .with_config(config.storage.clone()))
}
