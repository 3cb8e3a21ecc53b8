//! Shared identity and storage types for folio.
//!
//! A leaf crate with no internal folio dependencies. Storage providers, the
//! edit-block engine and the CLI all speak these types.
//!
//! | Type              | Purpose                                         |
//! |-------------------|-------------------------------------------------|
//! | [`ProjectId`]     | Which project a file or pending change belongs to |
//! | [`UserId`]        | Whose pending overlay                           |
//! | [`FileEntry`]     | One directory listing row                       |
//! | [`GitStatus`]     | Working-tree snapshot (real or synthesized)     |
//! | [`Commit`]        | History record                                  |
//! | [`PendingChange`] | Uncommitted edit in cloud mode                  |
//! | [`EditBlock`]     | SEARCH/REPLACE directive from a chat message    |

pub mod edit;
pub mod ids;
pub mod storage;

pub use edit::{ContentSegment, EditBlock, EditStats, ParsedEdits};
pub use ids::{ProjectId, UserId};
pub use storage::{
    ChangeStatus, Commit, CommitAuthor, EntryKind, FileEntry, GitStatus, PendingAction,
    PendingChange, PullResult, StatusEntry, sort_entries,
};
