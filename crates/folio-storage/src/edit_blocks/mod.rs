//! SEARCH/REPLACE edit blocks from chat responses.
//!
//! ```text
//! <<<<<<< SEARCH
//! text expected in the document
//! =======
//! replacement
//! >>>>>>> REPLACE
//! ```
//!
//! Parsing, matching and applying are pure functions over `&str`;
//! [`apply_response_to_file`] ties them to a [`StorageProvider`].

mod apply;
mod matcher;
mod parse;

pub use apply::{ApplyReport, apply_edits, apply_edits_with_report, compute_edit_stats};
pub use matcher::{find_overlaps, match_blocks_to_document};
pub use parse::{parse_content_segments, parse_edit_blocks};

use folio_types::ParsedEdits;
use tracing::{info, warn};

use crate::error::StorageResult;
use crate::provider::StorageProvider;

/// Parse a response and match its blocks against `doc` in one pass.
pub fn parse_and_match_edits(response: &str, doc: &str) -> ParsedEdits {
    let blocks = match_blocks_to_document(&parse_edit_blocks(response), doc);
    ParsedEdits {
        text_segments: parse_content_segments(response),
        stats: compute_edit_stats(&blocks),
        overlaps: find_overlaps(&blocks),
        blocks,
    }
}

/// Read `path`, apply the response's blocks, and write the result back if
/// anything applied.
pub async fn apply_response_to_file(
    provider: &dyn StorageProvider,
    path: &str,
    response: &str,
) -> StorageResult<ApplyReport> {
    let doc = provider.read_file(path).await?;
    let parsed = parse_and_match_edits(response, &doc);
    if !parsed.overlaps.is_empty() {
        warn!(path, overlaps = ?parsed.overlaps, "edit blocks overlap");
    }

    let report = apply_edits_with_report(&doc, &parsed.blocks);
    if report.changed() {
        provider.write_file(path, &report.content).await?;
    }
    info!(
        path,
        applied = report.applied.len(),
        stale = report.stale.len(),
        unmatched = report.unmatched.len(),
        "edit blocks applied"
    );
    Ok(report)
}
