//! Local filesystem + git working tree provider.
//!
//! Every path goes through [`validate_path`] before it touches the disk, and
//! every version-control operation shells out to `git` in the root with the
//! configured timeout.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use folio_types::{Commit, FileEntry, GitStatus, PullResult, sort_entries};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::blob::unix_millis;
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::git::{
    GitError, GitOutput, LOG_FORMAT, exec_git, parse_conflicts, parse_log, parse_status,
};
use crate::path::{file_name, join_api_path, validate_path};
use crate::provider::{ListOptions, LogOptions, StorageProvider};

/// Provider over a directory that is (usually) a git working tree.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/handbook`, then `read_file("/guides/setup.md")` reads
/// `/home/amy/handbook/guides/setup.md`.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    root: PathBuf,
    config: StorageConfig,
}

impl LocalStorageProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, StorageConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(&self.root, path)
    }

    /// Validate `path` and return it root-relative, as git expects it.
    fn git_pathspec(&self, path: &str) -> StorageResult<String> {
        self.resolve(path)?;
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(relative.to_string())
        }
    }

    async fn git<I, S>(&self, args: I) -> StorageResult<GitOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Ok(exec_git(&self.root, args, self.config.git_timeout()).await?)
    }

    async fn head_sha(&self) -> StorageResult<String> {
        Ok(self.git(["rev-parse", "HEAD"]).await?.trimmed().to_string())
    }

    async fn conflicts(&self) -> StorageResult<Vec<String>> {
        let out = self.git(["status", "--porcelain"]).await?;
        Ok(parse_conflicts(&out.stdout))
    }
}

/// Map a missing file onto `NotFound(path)`; pass everything else through.
fn io_error(path: &str, e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(path)
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    async fn list_directory(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> StorageResult<Vec<FileEntry>> {
        let full_path = self.resolve(path)?;
        let mut dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| io_error(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks; dangling links are skipped.
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(name = %name, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !options.accepts(&name, meta.is_dir()) {
                continue;
            }

            let api_path = join_api_path(path, &name);
            if meta.is_dir() {
                entries.push(FileEntry::directory(name, api_path));
            } else {
                let modified = meta.modified().ok().map(unix_millis);
                entries.push(FileEntry::file(name, api_path, meta.len(), modified));
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
        let full_path = self.resolve(path)?;
        if !self.config.is_readable_document(file_name(path)) {
            return Err(StorageError::binary_file(path));
        }

        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| io_error(path, e))?;
        if meta.is_dir() {
            return Err(StorageError::invalid_path(path));
        }
        if meta.len() > self.config.max_file_size {
            return Err(StorageError::FileTooLarge {
                path: path.to_string(),
                size: meta.len(),
                limit: self.config.max_file_size,
            });
        }

        let bytes = fs::read(&full_path).await.map_err(|e| io_error(path, e))?;
        String::from_utf8(bytes).map_err(|_| StorageError::binary_file(path))
    }

    async fn write_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, content).await?;
        debug!(path, bytes = content.len(), "file written");
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        if path.trim_matches('/').is_empty() {
            return Err(StorageError::invalid_path(path));
        }
        let full_path = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(|e| io_error(path, e))?;
        if meta.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_file(&full_path).await?;
        }
        debug!(path, dir = meta.is_dir(), "deleted");
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> StorageResult<()> {
        let full_path = self.resolve(path)?;
        fs::create_dir_all(&full_path).await?;
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> StorageResult<()> {
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;
        if to != from && to.starts_with(&from) {
            return Err(StorageError::invalid_input(format!(
                "cannot move {old_path} into itself"
            )));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to)
            .await
            .map_err(|e| io_error(old_path, e))?;
        debug!(from = old_path, to = new_path, "renamed");
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full_path = self.resolve(path)?;
        Ok(fs::try_exists(&full_path).await?)
    }

    async fn status(&self) -> StorageResult<GitStatus> {
        let out = self.git(["status", "--porcelain", "-b"]).await?;
        Ok(parse_status(&out.stdout))
    }

    async fn log(&self, options: &LogOptions) -> StorageResult<Vec<Commit>> {
        let mut args = vec![
            "log".to_string(),
            LOG_FORMAT.to_string(),
            "-n".to_string(),
            options.limit.to_string(),
        ];
        if let Some(path) = &options.path {
            args.push("--".to_string());
            args.push(self.git_pathspec(path)?);
        }

        match self.git(&args).await {
            Ok(out) => Ok(parse_log(&out.stdout)?),
            // A repository with no commits has no history, not a failure.
            Err(StorageError::Git(GitError::CommandFailed { stderr, .. }))
                if stderr.contains("does not have any commits") =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn add(&self, paths: &[String]) -> StorageResult<()> {
        let mut args = vec!["add".to_string()];
        if paths.is_empty() {
            args.push("-A".to_string());
        } else {
            args.push("--".to_string());
            for path in paths {
                args.push(self.git_pathspec(path)?);
            }
        }
        self.git(&args).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> StorageResult<String> {
        if message.trim().is_empty() {
            return Err(StorageError::invalid_input("commit message is empty"));
        }
        self.git(["commit", "-m", message]).await?;
        let sha = self.head_sha().await?;
        info!(sha = %sha, "committed");
        Ok(sha)
    }

    async fn push(&self) -> StorageResult<()> {
        self.git(["push"]).await?;
        info!("pushed");
        Ok(())
    }

    async fn pull(&self) -> StorageResult<PullResult> {
        let before = self.head_sha().await.ok();

        let output = match self.git(["pull"]).await {
            Ok(out) => out.combined(),
            Err(e @ StorageError::Git(GitError::CommandFailed { .. })) => {
                // A merge stopped by conflicts exits non-zero; that's a result.
                let conflicts = self.conflicts().await.unwrap_or_default();
                if conflicts.is_empty() {
                    return Err(e);
                }
                warn!(count = conflicts.len(), "pull stopped on conflicts");
                return Ok(PullResult::conflicted(conflicts));
            }
            Err(e) => return Err(e),
        };

        if output.contains("CONFLICT") {
            let conflicts = self.conflicts().await?;
            warn!(count = conflicts.len(), "pull reported conflicts");
            return Ok(PullResult::conflicted(conflicts));
        }

        let after = self.head_sha().await.ok();
        let commits = match (before, after) {
            (Some(before), Some(after)) if before != after => {
                let range = format!("{before}..{after}");
                match self.git(["rev-list", "--count", range.as_str()]).await {
                    Ok(out) => out.trimmed().parse().unwrap_or(0),
                    Err(_) => 0,
                }
            }
            _ => 0,
        };

        info!(commits, "pulled");
        Ok(PullResult {
            pulled: true,
            commits,
            conflicts: Vec::new(),
        })
    }

    async fn restore(&self, path: &str) -> StorageResult<()> {
        let pathspec = self.git_pathspec(path)?;
        self.git(["checkout", "HEAD", "--", pathspec.as_str()]).await?;
        debug!(path, "restored");
        Ok(())
    }

    async fn get_current_branch(&self) -> StorageResult<String> {
        Ok(self
            .git(["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trimmed()
            .to_string())
    }

    async fn get_remote_url(&self) -> StorageResult<Option<String>> {
        match self.git(["remote", "get-url", "origin"]).await {
            Ok(out) => Ok(Some(out.trimmed().to_string())),
            Err(StorageError::Git(GitError::CommandFailed { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{ChangeStatus, EntryKind};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn git(dir: &Path, args: &[&str]) -> GitOutput {
        exec_git(dir, args, Duration::from_secs(30)).await.unwrap()
    }

    async fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]).await;
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]).await;
        git(dir, &["config", "user.email", "amy@example.com"]).await;
        git(dir, &["config", "user.name", "Amy"]).await;
        git(dir, &["config", "commit.gpgsign", "false"]).await;
    }

    async fn setup_repo() -> (LocalStorageProvider, TempDir) {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path()).await;
        (LocalStorageProvider::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let (provider, _dir) = setup_repo().await;
        provider.write_file("/guides/setup.md", "# Setup\n").await.unwrap();
        assert_eq!(provider.read_file("/guides/setup.md").await.unwrap(), "# Setup\n");
        assert!(provider.exists("/guides").await.unwrap());
        assert!(!provider.exists("/missing.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_rejections() {
        let (provider, dir) = setup_repo().await;
        std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe]).unwrap();

        assert_eq!(provider.read_file("/logo.png").await.unwrap_err().kind(), "binary_file");
        assert_eq!(provider.read_file("/bad.md").await.unwrap_err().kind(), "binary_file");
        assert_eq!(provider.read_file("/nope.md").await.unwrap_err().kind(), "file_not_found");

        let small = LocalStorageProvider::with_config(
            dir.path(),
            StorageConfig::default().with_max_file_size(4),
        );
        std::fs::write(dir.path().join("big.md"), "0123456789").unwrap();
        assert!(matches!(
            small.read_file("/big.md").await.unwrap_err(),
            StorageError::FileTooLarge { size: 10, limit: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_traversal_is_an_error() {
        let (provider, _dir) = setup_repo().await;
        for op in ["../escape.md", "/../../etc/passwd.md"] {
            assert_eq!(provider.exists(op).await.unwrap_err().kind(), "path_traversal");
            assert_eq!(provider.read_file(op).await.unwrap_err().kind(), "path_traversal");
            assert_eq!(
                provider.write_file(op, "x").await.unwrap_err().kind(),
                "path_traversal"
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_through_dangling_link_is_refused() {
        let (provider, dir) = setup_repo().await;
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("escaped.md");
        std::os::unix::fs::symlink(&target, dir.path().join("link.md")).unwrap();

        let err = provider.write_file("/link.md", "pwned").await.unwrap_err();
        assert_eq!(err.kind(), "path_traversal");
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_list_sorted_and_filtered() {
        let (provider, dir) = setup_repo().await;
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha.txt")).unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.MD"), "a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "n").unwrap();
        std::fs::write(dir.path().join(".hidden.md"), "h").unwrap();

        let opts = ListOptions::default().with_extensions(["md"]);
        let entries = provider.list_directory("/", &opts).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alpha.txt", "zeta", "a.MD", "b.md"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[3].path, "/b.md");
        assert_eq!(entries[3].size, Some(1));
        assert!(entries[3].modified_at.is_some());

        let all = provider
            .list_directory("/", &ListOptions::default().with_hidden())
            .await
            .unwrap();
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&".git"));
        assert!(names.contains(&".hidden.md"));
        assert!(names.contains(&"notes.txt"));
    }

    #[tokio::test]
    async fn test_list_cap() {
        let (_, dir) = setup_repo().await;
        let provider = LocalStorageProvider::with_config(
            dir.path(),
            StorageConfig::default().with_max_list_entries(2),
        );
        for name in ["a.md", "b.md", "c.md"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        assert!(matches!(
            provider.list_directory("/", &ListOptions::default()).await,
            Err(StorageError::TooManyFiles { count: 3, limit: 2 })
        ));
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let (provider, _dir) = setup_repo().await;
        provider.write_file("/a.md", "A").await.unwrap();
        provider.rename("/a.md", "/archive/a.md").await.unwrap();
        assert!(!provider.exists("/a.md").await.unwrap());
        assert_eq!(provider.read_file("/archive/a.md").await.unwrap(), "A");

        provider.delete_file("/archive").await.unwrap();
        assert!(!provider.exists("/archive/a.md").await.unwrap());
        assert!(provider.delete_file("/archive").await.unwrap_err().is_not_found());
        assert_eq!(provider.delete_file("/").await.unwrap_err().kind(), "invalid_path");
    }

    #[tokio::test]
    async fn test_status_add_commit_log() {
        let (provider, _dir) = setup_repo().await;
        assert!(provider.log(&LogOptions::default()).await.unwrap().is_empty());

        provider.write_file("/a.md", "one").await.unwrap();
        let status = provider.status().await.unwrap();
        assert_eq!(status.branch, "main");
        assert_eq!(status.untracked, vec!["/a.md".to_string()]);

        provider.add(&["/a.md".to_string()]).await.unwrap();
        let status = provider.status().await.unwrap();
        assert_eq!(status.staged[0].status, ChangeStatus::Added);

        assert_eq!(provider.commit("  ").await.unwrap_err().kind(), "invalid_input");
        let sha = provider.commit("Add a | with pipe").await.unwrap();
        assert_eq!(sha.len(), 40);

        let log = provider.log(&LogOptions::default()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sha, sha);
        assert_eq!(log[0].message, "Add a | with pipe");
        assert_eq!(log[0].author.name, "Amy");

        let scoped = LogOptions {
            limit: 5,
            path: Some("/other.md".to_string()),
        };
        assert!(provider.log(&scoped).await.unwrap().is_empty());
        assert_eq!(provider.get_current_branch().await.unwrap(), "main");
    }

    #[tokio::test]
    async fn test_restore_discards_change() {
        let (provider, _dir) = setup_repo().await;
        provider.write_file("/a.md", "committed").await.unwrap();
        provider.add(&[]).await.unwrap();
        provider.commit("init").await.unwrap();

        provider.write_file("/a.md", "scratch").await.unwrap();
        assert_eq!(
            provider.status().await.unwrap().unstaged[0].status,
            ChangeStatus::Modified
        );
        provider.restore("/a.md").await.unwrap();
        assert_eq!(provider.read_file("/a.md").await.unwrap(), "committed");
        assert!(provider.status().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_remote_url() {
        let (provider, dir) = setup_repo().await;
        assert_eq!(provider.get_remote_url().await.unwrap(), None);
        git(
            dir.path(),
            &["remote", "add", "origin", "https://example.com/acme/handbook.git"],
        )
        .await;
        assert_eq!(
            provider.get_remote_url().await.unwrap().as_deref(),
            Some("https://example.com/acme/handbook.git")
        );
    }

    #[tokio::test]
    async fn test_push_and_pull_count_commits() {
        let root = TempDir::new().unwrap();
        let origin = root.path().join("origin.git");
        let a = root.path().join("a");
        let b = root.path().join("b");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&a).unwrap();
        git(&origin, &["init", "-q", "--bare"]).await;
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"]).await;

        init_repo(&a).await;
        let origin_url = origin.to_string_lossy().into_owned();
        git(&a, &["remote", "add", "origin", origin_url.as_str()]).await;
        let provider_a = LocalStorageProvider::new(&a);
        provider_a.write_file("/a.md", "one").await.unwrap();
        provider_a.add(&[]).await.unwrap();
        provider_a.commit("first").await.unwrap();
        git(&a, &["push", "-q", "-u", "origin", "main"]).await;

        git(root.path(), &["clone", "-q", origin_url.as_str(), "b"]).await;
        let provider_b = LocalStorageProvider::new(&b);
        assert_eq!(provider_b.pull().await.unwrap(), PullResult::up_to_date());

        provider_a.write_file("/a.md", "two").await.unwrap();
        provider_a.add(&[]).await.unwrap();
        provider_a.commit("second").await.unwrap();
        provider_a.write_file("/b.md", "three").await.unwrap();
        provider_a.add(&[]).await.unwrap();
        provider_a.commit("third").await.unwrap();
        provider_a.push().await.unwrap();

        let result = provider_b.pull().await.unwrap();
        assert!(result.pulled);
        assert_eq!(result.commits, 2);
        assert!(result.conflicts.is_empty());
        assert_eq!(provider_b.read_file("/b.md").await.unwrap(), "three");
    }

    #[tokio::test]
    async fn test_pull_conflict_is_data() {
        let root = TempDir::new().unwrap();
        let origin = root.path().join("origin.git");
        let a = root.path().join("a");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&a).unwrap();
        git(&origin, &["init", "-q", "--bare"]).await;
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"]).await;

        init_repo(&a).await;
        let origin_url = origin.to_string_lossy().into_owned();
        git(&a, &["remote", "add", "origin", origin_url.as_str()]).await;
        let provider_a = LocalStorageProvider::new(&a);
        provider_a.write_file("/a.md", "base\n").await.unwrap();
        provider_a.add(&[]).await.unwrap();
        provider_a.commit("base").await.unwrap();
        git(&a, &["push", "-q", "-u", "origin", "main"]).await;

        git(root.path(), &["clone", "-q", origin_url.as_str(), "b"]).await;
        let b = root.path().join("b");
        git(&b, &["config", "user.email", "bo@example.com"]).await;
        git(&b, &["config", "user.name", "Bo"]).await;
        git(&b, &["config", "commit.gpgsign", "false"]).await;
        git(&b, &["config", "pull.rebase", "false"]).await;
        let provider_b = LocalStorageProvider::new(&b);

        provider_a.write_file("/a.md", "from a\n").await.unwrap();
        provider_a.add(&[]).await.unwrap();
        provider_a.commit("a edit").await.unwrap();
        provider_a.push().await.unwrap();

        provider_b.write_file("/a.md", "from b\n").await.unwrap();
        provider_b.add(&[]).await.unwrap();
        provider_b.commit("b edit").await.unwrap();

        let result = provider_b.pull().await.unwrap();
        assert!(!result.pulled);
        assert_eq!(result.commits, 0);
        assert_eq!(result.conflicts, vec!["/a.md".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_retryable() {
        let (_, dir) = setup_repo().await;
        let provider = LocalStorageProvider::with_config(
            dir.path(),
            StorageConfig::default().with_git_timeout(Duration::from_nanos(1)),
        );
        // Either the spawn wins the race or the timer does; a timeout must be
        // reported as retryable.
        if let Err(e) = provider.status().await {
            assert!(e.is_retryable(), "unexpected error: {e}");
        }
    }
}
