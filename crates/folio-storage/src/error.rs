//! Storage error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::blob::BlobError;
use crate::git::GitError;

/// Storage provider error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File or directory not found.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Not a readable document type.
    #[error("binary or unsupported file: {0}")]
    BinaryFile(String),

    /// Document exceeds the read limit.
    #[error("file too large: {path} is {size} bytes (limit {limit})")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// Directory listing exceeds the entry cap.
    #[error("too many files: {count} entries (limit {limit})")]
    TooManyFiles { count: usize, limit: usize },

    /// Path resolves outside the repository root.
    #[error("path escapes repository root: {0}")]
    PathTraversal(String),

    /// The repository root itself cannot be resolved.
    #[error("repository root inaccessible: {}", root.display())]
    RepoRootInaccessible {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Missing or malformed argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown pending-change action tag.
    #[error("invalid pending action: {0}")]
    InvalidAction(String),

    /// Operation has no implementation for this provider.
    #[error("{operation} is not supported here: {hint}")]
    Unsupported {
        operation: &'static str,
        hint: &'static str,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("git: {0}")]
    Git(#[from] GitError),

    #[error("blob store: {0}")]
    Blob(#[from] BlobError),

    #[error("ledger: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn binary_file(path: impl Into<String>) -> Self {
        Self::BinaryFile(path.into())
    }

    pub fn path_traversal(path: impl Into<String>) -> Self {
        Self::PathTraversal(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unsupported(operation: &'static str, hint: &'static str) -> Self {
        Self::Unsupported { operation, hint }
    }

    /// Short, stable error-kind string for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "file_not_found",
            StorageError::BinaryFile(_) => "binary_file",
            StorageError::FileTooLarge { .. } => "file_too_large",
            StorageError::TooManyFiles { .. } => "too_many_files",
            StorageError::PathTraversal(_) => "path_traversal",
            StorageError::RepoRootInaccessible { .. } => "repo_root_inaccessible",
            StorageError::InvalidPath(_) => "invalid_path",
            StorageError::InvalidInput(_) => "invalid_input",
            StorageError::InvalidAction(_) => "invalid_action",
            StorageError::Unsupported { .. } => "not_implemented",
            StorageError::Config(_) => "config",
            StorageError::Git(e) => e.kind(),
            StorageError::Blob(BlobError::NotFound(_)) => "file_not_found",
            StorageError::Blob(_) => "blob_store",
            StorageError::Ledger(_) => "ledger",
            StorageError::Io(e) if e.kind() == io::ErrorKind::NotFound => "file_not_found",
            StorageError::Io(_) => "io",
        }
    }

    /// True for transient failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Git(e) if e.is_retryable())
    }

    /// True for missing-file outcomes, whichever layer reported them.
    pub fn is_not_found(&self) -> bool {
        self.kind() == "file_not_found"
    }
}

/// Convert StorageError to std::io::Error for compatibility.
impl From<StorageError> for io::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            StorageError::PathTraversal(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            StorageError::InvalidPath(msg) | StorageError::InvalidInput(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            unsupported @ StorageError::Unsupported { .. } => {
                io::Error::new(io::ErrorKind::Unsupported, unsupported.to_string())
            }
            StorageError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;
