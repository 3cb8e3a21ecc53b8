//! Blob store + pending-change ledger provider.
//!
//! Committed content is immutable from here: every edit lands in the
//! (project, user) overlay in the ledger and is read back ahead of the
//! committed blob. Reconciling the overlay with the remote repository
//! happens outside this provider; [`CloudStorageProvider::promote_pending`]
//! is the hook it calls once a remote commit has succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use folio_types::{
    Commit, FileEntry, GitStatus, PendingAction, PendingChange, ProjectId, PullResult, StatusEntry,
    UserId, sort_entries,
};
use tracing::{debug, info, warn};

use crate::blob::S3ContentStore;
use crate::config::StorageConfig;
use crate::constants::DEFAULT_BRANCH;
use crate::error::{StorageError, StorageResult};
use crate::ledger::PendingLedger;
use crate::path::{file_name, join_api_path, to_api_path, to_storage_path};
use crate::provider::{ListOptions, LogOptions, StorageProvider};

/// A file visible through the overlay.
#[derive(Debug, Clone, Copy)]
struct VisibleFile {
    size: u64,
    modified_at: i64,
}

pub struct CloudStorageProvider {
    content: Arc<S3ContentStore>,
    ledger: Arc<PendingLedger>,
    project_id: ProjectId,
    user_id: UserId,
    branch: String,
    remote_url: Option<String>,
    config: StorageConfig,
}

impl CloudStorageProvider {
    pub fn new(
        content: Arc<S3ContentStore>,
        ledger: Arc<PendingLedger>,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Self {
        Self {
            content,
            ledger,
            project_id,
            user_id,
            branch: DEFAULT_BRANCH.to_string(),
            remote_url: None,
            config: StorageConfig::default(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_remote_url(mut self, remote_url: Option<String>) -> Self {
        self.remote_url = remote_url;
        self
    }

    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// This user's uncommitted changes, ordered by path.
    pub fn pending_changes(&self) -> StorageResult<Vec<PendingChange>> {
        self.ledger.list(self.project_id, self.user_id)
    }

    /// Fold the overlay into committed storage after a successful remote
    /// commit. Returns how many changes were promoted.
    pub async fn promote_pending(&self) -> StorageResult<usize> {
        let changes = self.pending_changes()?;
        for change in &changes {
            if change.action.is_deleted() {
                self.content
                    .delete_committed(self.project_id, &change.path)
                    .await?;
                continue;
            }
            let body = match (&change.content, &change.s3_key) {
                (Some(content), _) => Some(content.clone()),
                (None, Some(key)) => self.content.get_by_key(key, &change.path).await?,
                (None, None) => None,
            };
            match body {
                Some(body) => {
                    self.content
                        .put_committed(self.project_id, &change.path, &body)
                        .await?
                }
                None => warn!(path = %change.path, "pending change has no body, skipping"),
            }
            if let Some(key) = &change.s3_key {
                self.content.delete_by_key(key).await?;
            }
        }

        self.ledger.clear(self.project_id, self.user_id)?;
        info!(
            project = %self.project_id,
            user = %self.user_id,
            count = changes.len(),
            "pending changes promoted"
        );
        Ok(changes.len())
    }

    /// Throw away every uncommitted change. Returns how many were dropped.
    pub async fn discard_all(&self) -> StorageResult<usize> {
        for change in self.pending_changes()? {
            if let Some(key) = &change.s3_key {
                self.content.delete_by_key(key).await?;
            }
        }
        let removed = self.ledger.clear(self.project_id, self.user_id)?;
        info!(
            project = %self.project_id,
            user = %self.user_id,
            removed,
            "pending changes discarded"
        );
        Ok(removed)
    }

    // ========================================================================
    // Overlay lookups
    // ========================================================================

    /// Storage key for an API path that must name a file.
    fn file_key(&self, path: &str) -> StorageResult<String> {
        let key = to_storage_path(path)?;
        if key.is_empty() {
            return Err(StorageError::invalid_path(path));
        }
        Ok(key)
    }

    fn pending(&self, key: &str) -> StorageResult<Option<PendingChange>> {
        self.ledger.get(self.project_id, self.user_id, key)
    }

    /// Body through the overlay: pending first, committed second. A pending
    /// tombstone hides the committed body.
    async fn read_body(&self, key: &str) -> StorageResult<Option<String>> {
        match self.pending(key)? {
            Some(change) if change.action.is_deleted() => return Ok(None),
            Some(PendingChange {
                content: Some(content),
                ..
            }) => return Ok(Some(content)),
            Some(PendingChange {
                s3_key: Some(blob_key),
                ..
            }) => {
                if let Some(body) = self.content.get_by_key(&blob_key, key).await? {
                    return Ok(Some(body));
                }
                warn!(
                    path = key,
                    blob_key = %blob_key,
                    "pending blob missing, falling back to committed"
                );
            }
            _ => {}
        }
        self.content.get_committed(self.project_id, key).await
    }

    /// Every file visible under `dir` (recursively), keyed by storage path.
    async fn visible_files(&self, dir: &str) -> StorageResult<BTreeMap<String, VisibleFile>> {
        let mut files = BTreeMap::new();
        for meta in self.content.list_committed(self.project_id, dir).await? {
            files.insert(
                meta.key,
                VisibleFile {
                    size: meta.size,
                    modified_at: meta.last_modified,
                },
            );
        }

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        for change in self.pending_changes()? {
            if !change.path.starts_with(&prefix) {
                continue;
            }
            if change.action.is_deleted() {
                files.remove(&change.path);
                continue;
            }
            let size = match (&change.content, &change.s3_key) {
                (Some(content), _) => content.len() as u64,
                (None, Some(key)) => match self.content.blobs().head(key).await? {
                    Some(meta) => meta.size,
                    None => continue,
                },
                (None, None) => continue,
            };
            files.insert(
                change.path,
                VisibleFile {
                    size,
                    modified_at: change.updated_at,
                },
            );
        }
        Ok(files)
    }

    async fn is_file(&self, key: &str) -> StorageResult<bool> {
        match self.pending(key)? {
            Some(change) => Ok(!change.action.is_deleted()),
            None => Ok(self
                .content
                .head_committed(self.project_id, key)
                .await?
                .is_some()),
        }
    }

    /// Record a deletion of one file. A file that only ever existed in the
    /// overlay simply leaves it.
    async fn tombstone(&self, key: &str) -> StorageResult<()> {
        let existing = self.pending(key)?;
        if let Some(blob_key) = existing.as_ref().and_then(|c| c.s3_key.as_ref()) {
            self.content.delete_by_key(blob_key).await?;
        }
        if matches!(&existing, Some(c) if c.action == PendingAction::Created) {
            self.ledger.remove(self.project_id, self.user_id, key)?;
        } else {
            self.ledger.upsert(
                self.project_id,
                self.user_id,
                key,
                PendingAction::Deleted,
                None,
                None,
            )?;
        }
        Ok(())
    }

    /// Record a pending body for `key`. Bodies over the inline limit go to a
    /// pending blob and the row keeps only its key.
    async fn write_body(
        &self,
        key: &str,
        content: &str,
        action: PendingAction,
    ) -> StorageResult<()> {
        let existing = self.pending(key)?;
        if content.len() > self.config.inline_content_limit {
            let blob_key = self
                .content
                .put_pending(self.project_id, self.user_id, key, content)
                .await?;
            self.ledger.upsert(
                self.project_id,
                self.user_id,
                key,
                action,
                None,
                Some(blob_key.as_str()),
            )?;
        } else {
            self.ledger.upsert(
                self.project_id,
                self.user_id,
                key,
                action,
                Some(content),
                None,
            )?;
            if let Some(stale) = existing.as_ref().and_then(|c| c.s3_key.as_ref()) {
                self.content.delete_by_key(stale).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for CloudStorageProvider {
    async fn list_directory(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> StorageResult<Vec<FileEntry>> {
        let dir = to_storage_path(path)?;
        let files = self.visible_files(&dir).await?;
        let prefix_len = if dir.is_empty() { 0 } else { dir.len() + 1 };

        let mut directories = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, file) in &files {
            let rest = &key[prefix_len..];
            match rest.split_once('/') {
                Some((child_dir, _)) => {
                    directories.insert(child_dir.to_string());
                }
                None => {
                    if options.accepts(rest, false) {
                        entries.push(FileEntry::file(
                            rest,
                            join_api_path(path, rest),
                            file.size,
                            Some(file.modified_at),
                        ));
                    }
                }
            }
        }
        for name in directories {
            if options.accepts(&name, true) {
                let api_path = join_api_path(path, &name);
                entries.push(FileEntry::directory(name, api_path));
            }
        }

        if entries.len() > self.config.max_list_entries {
            return Err(StorageError::TooManyFiles {
                count: entries.len(),
                limit: self.config.max_list_entries,
            });
        }

        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> StorageResult<String> {
        let key = self.file_key(path)?;
        if !self.config.is_readable_document(file_name(&key)) {
            return Err(StorageError::binary_file(path));
        }

        let body = self
            .read_body(&key)
            .await?
            .ok_or_else(|| StorageError::not_found(path))?;
        if body.len() as u64 > self.config.max_file_size {
            return Err(StorageError::FileTooLarge {
                path: path.to_string(),
                size: body.len() as u64,
                limit: self.config.max_file_size,
            });
        }
        Ok(body)
    }

    async fn write_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let key = self.file_key(path)?;
        self.write_body(&key, content, PendingAction::Modified).await?;
        debug!(path = %key, bytes = content.len(), "pending write recorded");
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let key = self.file_key(path)?;
        if self.is_file(&key).await? {
            self.tombstone(&key).await?;
            debug!(path = %key, "pending delete recorded");
            return Ok(());
        }

        // A directory: tombstone everything visible beneath it.
        let files = self.visible_files(&key).await?;
        if files.is_empty() {
            return Err(StorageError::not_found(path));
        }
        for file in files.keys() {
            self.tombstone(file).await?;
        }
        debug!(path = %key, count = files.len(), "pending directory delete recorded");
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> StorageResult<()> {
        // Directories are key prefixes; there is nothing to create.
        to_storage_path(path)?;
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> StorageResult<()> {
        let from = self.file_key(old_path)?;
        let to = self.file_key(new_path)?;
        if to.starts_with(&format!("{from}/")) {
            return Err(StorageError::invalid_input(format!(
                "cannot move {old_path} into itself"
            )));
        }

        let moves: Vec<(String, String)> = if self.is_file(&from).await? {
            vec![(from.clone(), to.clone())]
        } else {
            let files = self.visible_files(&from).await?;
            if files.is_empty() {
                return Err(StorageError::not_found(old_path));
            }
            files
                .into_keys()
                .map(|key| {
                    let moved = format!("{}{}", to, &key[from.len()..]);
                    (key, moved)
                })
                .collect()
        };
        if from == to {
            return Ok(());
        }

        // Write-new then delete-old: a failure between the two leaves both
        // paths visible.
        for (src, dst) in &moves {
            let body = self
                .read_body(src)
                .await?
                .ok_or_else(|| StorageError::not_found(to_api_path(src)))?;
            self.write_body(dst, &body, PendingAction::Created).await?;
            if let Err(e) = self.tombstone(src).await {
                warn!(from = %src, to = %dst, error = %e, "rename left source in place");
                return Err(e);
            }
        }
        debug!(from = %from, to = %to, count = moves.len(), "pending rename recorded");
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let key = to_storage_path(path)?;
        if key.is_empty() {
            return Ok(true);
        }
        if let Some(change) = self.pending(&key)? {
            return Ok(!change.action.is_deleted());
        }
        if self
            .content
            .head_committed(self.project_id, &key)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        // A directory exists while anything beneath it is visible.
        let prefix = format!("{key}/");
        let pending = self.pending_changes()?;
        let under: Vec<_> = pending.iter().filter(|c| c.path.starts_with(&prefix)).collect();
        if under.iter().any(|c| !c.action.is_deleted()) {
            return Ok(true);
        }
        if !self.content.has_committed_under(self.project_id, &key).await? {
            return Ok(false);
        }
        if under.is_empty() {
            return Ok(true);
        }
        Ok(!self.visible_files(&key).await?.is_empty())
    }

    async fn status(&self) -> StorageResult<GitStatus> {
        let unstaged = self
            .pending_changes()?
            .into_iter()
            .map(|change| {
                StatusEntry::new(to_api_path(&change.path), change.action.change_status())
            })
            .collect();
        Ok(GitStatus {
            branch: self.branch.clone(),
            ahead: 0,
            behind: 0,
            staged: Vec::new(),
            unstaged,
            untracked: Vec::new(),
        })
    }

    async fn log(&self, _options: &LogOptions) -> StorageResult<Vec<Commit>> {
        Err(StorageError::unsupported(
            "log",
            "history comes from the remote repository API",
        ))
    }

    async fn add(&self, paths: &[String]) -> StorageResult<()> {
        // No index: every pending change is already part of the next commit.
        debug!(count = paths.len(), "add is a no-op for cloud projects");
        Ok(())
    }

    async fn commit(&self, _message: &str) -> StorageResult<String> {
        Err(StorageError::unsupported(
            "commit",
            "commit through the authenticated HTTP commit endpoint",
        ))
    }

    async fn push(&self) -> StorageResult<()> {
        // Commits go straight to the remote.
        Ok(())
    }

    async fn pull(&self) -> StorageResult<PullResult> {
        Err(StorageError::unsupported(
            "pull",
            "committed content is synced from the remote repository API",
        ))
    }

    async fn restore(&self, path: &str) -> StorageResult<()> {
        let key = self.file_key(path)?;
        if let Some(blob_key) = self.pending(&key)?.and_then(|c| c.s3_key) {
            self.content.delete_by_key(&blob_key).await?;
        }
        self.ledger.remove(self.project_id, self.user_id, &key)?;
        debug!(path = %key, "pending change restored");
        Ok(())
    }

    async fn get_current_branch(&self) -> StorageResult<String> {
        Ok(self.branch.clone())
    }

    async fn get_remote_url(&self) -> StorageResult<Option<String>> {
        Ok(self.remote_url.clone())
    }
}
