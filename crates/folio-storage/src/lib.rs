//! Storage core for folio.
//!
//! Documents live either in a local git working tree or in a blob store
//! with a per-user overlay of pending changes. Both sit behind
//! [`StorageProvider`], chosen at construction time by [`open_provider`].
//!
//! # Modules
//!
//! - [`path`] - traversal-safe path resolution and path conventions
//! - [`git`] - subprocess git with timeouts, porcelain/log parsers
//! - [`backends`] - [`LocalStorageProvider`] and [`CloudStorageProvider`]
//! - [`blob`] - object-store seam and the project key layout
//! - [`ledger`] - SQLite pending-change ledger
//! - [`edit_blocks`] - SEARCH/REPLACE parsing, matching and applying

pub mod backends;
pub mod blob;
pub mod config;
pub mod constants;
pub mod edit_blocks;
pub mod error;
pub mod git;
pub mod ledger;
pub mod path;
pub mod provider;

pub use backends::{CloudStorageProvider, LocalStorageProvider};
pub use blob::{BlobError, BlobStore, FsBlobStore, MemoryBlobStore, S3ContentStore};
pub use config::{CloudConfig, FolioConfig, StorageConfig, StorageMode};
pub use edit_blocks::{
    ApplyReport, apply_edits, apply_edits_with_report, apply_response_to_file, compute_edit_stats,
    find_overlaps, match_blocks_to_document, parse_and_match_edits, parse_content_segments,
    parse_edit_blocks,
};
pub use error::{StorageError, StorageResult};
pub use git::{GitError, GitOutput, exec_git};
pub use ledger::PendingLedger;
pub use path::validate_path;
pub use provider::{ListOptions, LogOptions, StorageProvider, open_cloud_provider, open_provider};
