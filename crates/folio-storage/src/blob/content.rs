//! Project document layout over a [`BlobStore`].
//!
//! ```text
//! projects/{project}/files/{path}             committed body
//! projects/{project}/pending/{user}/{path}    pending body too large to inline
//! ```
//!
//! Paths here use the storage convention: no leading `/`.

use std::sync::Arc;

use folio_types::{ProjectId, UserId};

use super::{BlobError, BlobMeta, BlobStore};
use crate::constants::BLOB_LIST_PAGE_SIZE;
use crate::error::{StorageError, StorageResult};

pub struct S3ContentStore {
    blobs: Arc<dyn BlobStore>,
}

impl S3ContentStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    fn files_prefix(project: ProjectId) -> String {
        format!("projects/{project}/files/")
    }

    pub fn committed_key(project: ProjectId, path: &str) -> String {
        format!("{}{}", Self::files_prefix(project), path)
    }

    pub fn pending_key(project: ProjectId, user: UserId, path: &str) -> String {
        format!("projects/{project}/pending/{user}/{path}")
    }

    // ========================================================================
    // Committed content
    // ========================================================================

    /// Committed body, `None` when there is none.
    pub async fn get_committed(
        &self,
        project: ProjectId,
        path: &str,
    ) -> StorageResult<Option<String>> {
        self.get_text(&Self::committed_key(project, path), path).await
    }

    pub async fn head_committed(
        &self,
        project: ProjectId,
        path: &str,
    ) -> StorageResult<Option<BlobMeta>> {
        Ok(self.blobs.head(&Self::committed_key(project, path)).await?)
    }

    pub async fn put_committed(
        &self,
        project: ProjectId,
        path: &str,
        content: &str,
    ) -> StorageResult<()> {
        self.blobs
            .put(&Self::committed_key(project, path), content.as_bytes())
            .await?;
        Ok(())
    }

    pub async fn delete_committed(&self, project: ProjectId, path: &str) -> StorageResult<()> {
        self.blobs.delete(&Self::committed_key(project, path)).await?;
        Ok(())
    }

    /// Every committed file under `dir` (recursively), following continuation
    /// tokens until the listing is exhausted. Keys come back as storage paths.
    pub async fn list_committed(
        &self,
        project: ProjectId,
        dir: &str,
    ) -> StorageResult<Vec<BlobMeta>> {
        let base = Self::files_prefix(project);
        let prefix = match dir {
            "" => base.clone(),
            dir => format!("{base}{dir}/"),
        };

        let mut found = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .blobs
                .list(&prefix, token.as_deref(), BLOB_LIST_PAGE_SIZE)
                .await?;
            for mut meta in page.entries {
                if let Some(relative) = meta.key.strip_prefix(&base) {
                    meta.key = relative.to_string();
                    found.push(meta);
                }
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(found)
    }

    /// Whether any committed file lives under `dir`.
    pub async fn has_committed_under(&self, project: ProjectId, dir: &str) -> StorageResult<bool> {
        let prefix = format!("{}{}/", Self::files_prefix(project), dir);
        let page = self.blobs.list(&prefix, None, 1).await?;
        Ok(!page.entries.is_empty())
    }

    // ========================================================================
    // Pending content
    // ========================================================================

    /// Store a pending body and return its key for the ledger row.
    pub async fn put_pending(
        &self,
        project: ProjectId,
        user: UserId,
        path: &str,
        content: &str,
    ) -> StorageResult<String> {
        let key = Self::pending_key(project, user, path);
        self.blobs.put(&key, content.as_bytes()).await?;
        Ok(key)
    }

    /// Read a pending body by the key recorded in the ledger.
    pub async fn get_by_key(&self, key: &str, path: &str) -> StorageResult<Option<String>> {
        self.get_text(key, path).await
    }

    pub async fn delete_by_key(&self, key: &str) -> StorageResult<()> {
        self.blobs.delete(key).await?;
        Ok(())
    }

    async fn get_text(&self, key: &str, path: &str) -> StorageResult<Option<String>> {
        match self.blobs.get(key).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::binary_file(path)),
            Err(BlobError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
