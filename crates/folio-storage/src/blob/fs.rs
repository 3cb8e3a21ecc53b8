//! Directory-backed blob store.
//!
//! Each key is a file under the root. Listing walks the tree, so this is
//! meant for single-machine deployments and the CLI, not for large buckets.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{BlobError, BlobMeta, BlobResult, BlobStore, ListPage, check_key, unix_millis};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the bucket, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> BlobResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }

    /// All keys under the root, sorted.
    async fn all_keys(&self) -> BlobResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> BlobResult<Vec<u8>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(key.into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> BlobResult<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        debug!(key, bytes = data.len(), "blob written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> BlobResult<Option<BlobMeta>> {
        let path = self.key_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(BlobMeta {
                key: key.to_string(),
                size: meta.len(),
                last_modified: meta.modified().map(unix_millis).unwrap_or(0),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> BlobResult<ListPage> {
        let keys = self.all_keys().await?;
        let mut matching = keys
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation.is_none_or(|token| key.as_str() > token));

        let mut entries = Vec::new();
        for key in matching.by_ref().take(max_keys.max(1)) {
            let meta = fs::metadata(self.root.join(&key)).await?;
            entries.push(BlobMeta {
                size: meta.len(),
                last_modified: meta.modified().map(unix_millis).unwrap_or(0),
                key,
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path().join("bucket")).unwrap();

        store.put("projects/p/files/docs/a.md", b"# A").await.unwrap();
        assert!(dir.path().join("bucket/projects/p/files/docs/a.md").is_file());
        assert_eq!(store.get("projects/p/files/docs/a.md").await.unwrap(), b"# A");

        let meta = store.head("projects/p/files/docs/a.md").await.unwrap().unwrap();
        assert_eq!(meta.size, 3);
        assert!(store.head("projects/p/files/docs").await.unwrap().is_none());

        store.delete("projects/p/files/docs/a.md").await.unwrap();
        store.delete("projects/p/files/docs/a.md").await.unwrap();
        assert!(matches!(
            store.get("projects/p/files/docs/a.md").await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_with_continuation() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        for key in ["x/a", "x/b/c", "x/d", "y/e"] {
            store.put(key, b"1").await.unwrap();
        }

        let first = store.list("x/", None, 2).await.unwrap();
        let keys: Vec<_> = first.entries.iter().map(|m| m.key.clone()).collect();
        assert_eq!(keys, ["x/a", "x/b/c"]);

        let second = store
            .list("x/", first.next_token.as_deref(), 2)
            .await
            .unwrap();
        let keys: Vec<_> = second.entries.iter().map(|m| m.key.clone()).collect();
        assert_eq!(keys, ["x/d"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path().join("bucket")).unwrap();
        assert!(matches!(
            store.put("../outside", b"x").await,
            Err(BlobError::InvalidKey(_))
        ));
        assert!(!dir.path().join("outside").exists());
    }
}
