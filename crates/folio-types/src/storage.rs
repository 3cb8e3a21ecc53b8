//! Storage-facing data model: listings, VCS status, history, pending changes.
//!
//! These shapes cross the provider boundary unchanged, so they serialize as
//! camelCase JSON for the web layer. Paths on [`FileEntry`], [`StatusEntry`]
//! and [`GitStatus::untracked`] use the API convention (leading `/`);
//! [`PendingChange::path`] uses the storage convention (no leading slash).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Kind of a listing entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// One row of a directory listing. Rebuilt on every listing, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Root-relative path with a leading `/`.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification, unix milliseconds (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
}

impl FileEntry {
    /// A file entry.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        modified_at: Option<i64>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            modified_at,
        }
    }

    /// A directory entry.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::Directory,
            size: None,
            modified_at: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Sort a listing: directories first, then by name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Per-file change kind reported by `status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeStatus {
    /// Map a porcelain status letter. Anything unrecognised (C, T, U, ...)
    /// reports as modified.
    pub fn from_porcelain(c: char) -> Self {
        match c {
            'A' => ChangeStatus::Added,
            'D' => ChangeStatus::Deleted,
            'R' => ChangeStatus::Renamed,
            _ => ChangeStatus::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A path plus its change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: String,
    pub status: ChangeStatus,
}

impl StatusEntry {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Snapshot of working-tree state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub staged: Vec<StatusEntry>,
    pub unstaged: Vec<StatusEntry>,
    pub untracked: Vec<String>,
}

impl GitStatus {
    /// True when nothing is staged, unstaged or untracked.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// A read-only history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub author: CommitAuthor,
    /// Author date, strict ISO 8601 as emitted by git.
    pub date: String,
}

/// Outcome of a pull. A conflicted pull is a normal result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResult {
    pub pulled: bool,
    pub commits: u32,
    pub conflicts: Vec<String>,
}

impl PullResult {
    pub fn up_to_date() -> Self {
        Self {
            pulled: true,
            commits: 0,
            conflicts: Vec::new(),
        }
    }

    pub fn conflicted(conflicts: Vec<String>) -> Self {
        Self {
            pulled: false,
            commits: 0,
            conflicts,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// What an uncommitted change does to its path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    #[strum(serialize = "created")]
    Created,
    #[strum(serialize = "modified")]
    Modified,
    #[strum(serialize = "deleted")]
    Deleted,
}

impl PendingAction {
    /// Strict parse; unknown tags are rejected rather than defaulted.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PendingAction::Created => "created",
            PendingAction::Modified => "modified",
            PendingAction::Deleted => "deleted",
        }
    }

    /// How this action shows up in a synthesized status.
    pub fn change_status(&self) -> ChangeStatus {
        match self {
            PendingAction::Created => ChangeStatus::Added,
            PendingAction::Deleted => ChangeStatus::Deleted,
            PendingAction::Modified => ChangeStatus::Modified,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, PendingAction::Deleted)
    }
}

impl std::fmt::Display for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One uncommitted edit for one (project, user, path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Storage-relative path, no leading slash.
    pub path: String,
    pub action: PendingAction,
    /// Inline body; `None` for tombstones and for bodies kept in blob storage.
    pub content: Option<String>,
    /// Blob key holding the body when it was too large to inline.
    pub s3_key: Option<String>,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl PendingChange {
    /// True when the body lives somewhere (inline or blob), i.e. not a tombstone.
    pub fn has_body(&self) -> bool {
        !self.action.is_deleted() && (self.content.is_some() || self.s3_key.is_some())
    }
}
