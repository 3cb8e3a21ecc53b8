//! Storage limits and defaults.
//!
//! Centralizes hardcoded values for easier configuration and documentation.
//! Every value here can be overridden through [`crate::StorageConfig`].

use std::time::Duration;

/// Maximum entries returned by one directory listing.
pub const DEFAULT_MAX_LIST_ENTRIES: usize = 1000;

/// Largest document `read_file` will return (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Extensions `read_file` accepts. Everything else is treated as binary.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["md", "mdx"];

/// Wall-clock limit for one git subprocess.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending bodies larger than this are stored as blobs, not inline ledger rows.
pub const DEFAULT_INLINE_CONTENT_LIMIT: usize = 256 * 1024;

/// Branch reported by cloud projects that don't configure one.
pub const DEFAULT_BRANCH: &str = "main";

/// Page size requested when walking blob listings.
pub const BLOB_LIST_PAGE_SIZE: usize = 1000;

/// Default config file looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";
