//! In-memory blob store.
//!
//! Used for tests and ephemeral cloud projects. All data is lost when dropped.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BlobError, BlobMeta, BlobResult, BlobStore, ListPage, check_key, unix_millis};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    last_modified: i64,
}

/// Ordered map of key → body. Listing order falls out of the `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Every stored key, in order.
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> BlobResult<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .map(|b| b.data.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: &[u8]) -> BlobResult<()> {
        check_key(key)?;
        self.blobs.write().insert(
            key.to_string(),
            StoredBlob {
                data: data.to_vec(),
                last_modified: unix_millis(SystemTime::now()),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.blobs.write().remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> BlobResult<Option<BlobMeta>> {
        Ok(self.blobs.read().get(key).map(|b| BlobMeta {
            key: key.to_string(),
            size: b.data.len() as u64,
            last_modified: b.last_modified,
        }))
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> BlobResult<ListPage> {
        let blobs = self.blobs.read();
        let start = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut matching = blobs
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));

        let mut entries = Vec::new();
        for (key, blob) in matching.by_ref().take(max_keys.max(1)) {
            entries.push(BlobMeta {
                key: key.clone(),
                size: blob.data.len() as u64,
                last_modified: blob.last_modified,
            });
        }
        let next_token = match matching.next() {
            Some(_) => entries.last().map(|meta| meta.key.clone()),
            None => None,
        };

        Ok(ListPage {
            entries,
            next_token,
        })
    }
}
