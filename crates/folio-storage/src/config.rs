//! Storage configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! mode = "cloud"
//!
//! [storage]
//! max_file_size = 1048576
//! git_timeout_ms = 10000
//!
//! [cloud]
//! database = "/var/lib/folio/ledger.db"
//! blob_root = "/var/lib/folio/blobs"
//! project_id = "0190c2a4-5f0e-7d3c-9b1a-2e4f6a8c0d12"
//! user_id = "0190c2a4-6a11-7b0e-8c2d-4f6a8c0d1e23"
//! branch = "main"
//! remote_url = "https://github.com/acme/handbook"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_types::{ProjectId, UserId};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_BRANCH, DEFAULT_GIT_TIMEOUT, DEFAULT_INLINE_CONTENT_LIMIT,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_LIST_ENTRIES,
};
use crate::error::{StorageError, StorageResult};

/// Which provider backs a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Filesystem + git working tree.
    #[default]
    Local,
    /// Blob store + pending-change ledger.
    Cloud,
}

/// Limits shared by both providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_list_entries: usize,
    pub max_file_size: u64,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
    pub git_timeout_ms: u64,
    pub inline_content_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_list_entries: DEFAULT_MAX_LIST_ENTRIES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            git_timeout_ms: DEFAULT_GIT_TIMEOUT.as_millis() as u64,
            inline_content_limit: DEFAULT_INLINE_CONTENT_LIMIT,
        }
    }
}

impl StorageConfig {
    pub fn with_max_list_entries(mut self, max: usize) -> Self {
        self.max_list_entries = max;
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_inline_content_limit(mut self, limit: usize) -> Self {
        self.inline_content_limit = limit;
        self
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.git_timeout_ms)
    }

    /// Whether `name` has one of the readable document extensions.
    pub fn is_readable_document(&self, name: &str) -> bool {
        match extension_of(name) {
            Some(ext) => self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// The substring after the last `.`, if any.
pub(crate) fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Cloud-mode settings: where the ledger and blobs live and whose overlay to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// SQLite ledger path. `None` keeps the ledger in memory.
    pub database: Option<PathBuf>,
    /// Directory backing the blob store.
    pub blob_root: Option<PathBuf>,
    pub project_id: Option<ProjectId>,
    pub user_id: Option<UserId>,
    pub branch: String,
    pub remote_url: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            database: None,
            blob_root: None,
            project_id: None,
            user_id: None,
            branch: DEFAULT_BRANCH.to_string(),
            remote_url: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    pub mode: StorageMode,
    /// Working tree root for local mode.
    pub root: Option<PathBuf>,
    pub storage: StorageConfig,
    pub cloud: CloudConfig,
}

impl FolioConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> StorageResult<Self> {
        toml::from_str(s).map_err(|e| StorageError::config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StorageError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}
