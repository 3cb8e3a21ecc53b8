//! Blob storage.
//!
//! [`BlobStore`] is the object-store seam: flat string keys, whole-object
//! get/put, and paginated prefix listing with a continuation token, the
//! shape S3 exposes. [`S3ContentStore`] lays project documents out on top of
//! any implementation.

mod content;
mod fs;
mod memory;

pub use content::S3ContentStore;
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a blob backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything the backend reports that isn't covered above.
    #[error("{0}")]
    Backend(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Object metadata from `head` and `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    /// Unix milliseconds.
    pub last_modified: i64,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in ascending order.
    pub entries: Vec<BlobMeta>,
    /// Pass back to `list` for the next page; `None` on the last one.
    pub next_token: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whole object body.
    async fn get(&self, key: &str) -> BlobResult<Vec<u8>>;

    /// Create or overwrite.
    async fn put(&self, key: &str, data: &[u8]) -> BlobResult<()>;

    /// Remove. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    async fn head(&self, key: &str) -> BlobResult<Option<BlobMeta>>;

    /// Keys starting with `prefix`, at most `max_keys` per page, resuming
    /// after `continuation` when given.
    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> BlobResult<ListPage>;
}

/// Keys are `/`-separated relative paths with no empty, `.` or `..` segments.
pub(crate) fn check_key(key: &str) -> BlobResult<()> {
    let bad = key.is_empty()
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."));
    if bad {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub(crate) fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_checks() {
        assert!(check_key("projects/p/files/a.md").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/abs").is_err());
        assert!(check_key("a//b").is_err());
        assert!(check_key("a/../b").is_err());
        assert!(check_key("a/./b").is_err());
    }
}
