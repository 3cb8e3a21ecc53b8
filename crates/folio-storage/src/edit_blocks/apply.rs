//! Splicing matched blocks into a document.

use folio_types::{EditBlock, EditStats};
use serde::Serialize;
use tracing::debug;

/// Result of one apply pass. Indices refer to the input block slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub content: String,
    pub applied: Vec<usize>,
    /// Matched blocks whose text was no longer at their offset.
    pub stale: Vec<usize>,
    pub unmatched: Vec<usize>,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply every matched block to `doc`.
pub fn apply_edits(doc: &str, blocks: &[EditBlock]) -> String {
    apply_edits_with_report(doc, blocks).content
}

/// Apply matched blocks from the highest offset down, so earlier offsets stay
/// valid. Before each splice the recorded `matched_text` must still sit at
/// its offset; if it doesn't, the block is skipped.
pub fn apply_edits_with_report(doc: &str, blocks: &[EditBlock]) -> ApplyReport {
    let mut report = ApplyReport {
        content: doc.to_string(),
        ..Default::default()
    };

    let mut spans = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        match (block.matched, block.match_index, block.matched_text.as_deref()) {
            (true, Some(at), Some(text)) => spans.push((index, at, text)),
            _ => report.unmatched.push(index),
        }
    }
    // Stable: blocks sharing an offset keep their input order.
    spans.sort_by(|a, b| b.1.cmp(&a.1));

    for (index, at, text) in spans {
        match at.checked_add(text.len()) {
            Some(end) if report.content.get(at..end) == Some(text) => {
                report.content.replace_range(at..end, &blocks[index].replace);
                report.applied.push(index);
            }
            _ => {
                debug!(block = index, offset = at, "stale edit block skipped");
                report.stale.push(index);
            }
        }
    }

    report.applied.sort_unstable();
    report.stale.sort_unstable();
    report
}

/// Line-count delta per block: growth counts as insertions, shrinkage as
/// deletions. A rewrite that keeps the line count contributes nothing.
pub fn compute_edit_stats(blocks: &[EditBlock]) -> EditStats {
    let mut stats = EditStats::default();
    for block in blocks {
        let before = block.search.split('\n').count();
        let after = block.replace.split('\n').count();
        if after > before {
            stats.insertions += after - before;
        } else {
            stats.deletions += before - after;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit_blocks::match_blocks_to_document;

    fn matched(search: &str, replace: &str, doc: &str) -> EditBlock {
        match_blocks_to_document(&[EditBlock::new(search, replace)], doc).remove(0)
    }

    #[test]
    fn test_single_block_replaces_first_occurrence() {
        let doc = "one two one";
        let block = matched("one", "1", doc);
        assert_eq!(apply_edits(doc, &[block]), "1 two one");
    }

    #[test]
    fn test_order_independent() {
        let doc = format!(
            "{}FIRST{}SECOND{}",
            "a".repeat(10),
            "b".repeat(35),
            "c".repeat(44)
        );
        assert_eq!(doc.len(), 100);
        let first = matched("FIRST", "<A>", &doc);
        let second = matched("SECOND", "<B>", &doc);
        assert_eq!(first.match_index, Some(10));
        assert_eq!(second.match_index, Some(50));

        let forward = apply_edits(&doc, &[first.clone(), second.clone()]);
        let backward = apply_edits(&doc, &[second, first]);
        assert_eq!(forward, backward);
        assert_eq!(&forward[10..13], "<A>");
        assert!(forward.contains("<B>"));
        assert_eq!(forward.len(), 100 - 5 - 6 + 3 + 3);
    }

    #[test]
    fn test_stale_block_is_skipped() {
        let doc = "keep this\nchange that\n";
        let stale = matched("keep this", "KEPT", doc);
        let fresh = matched("change that", "CHANGED", doc);

        let edited = "keep THIS\nchange that\n";
        let report = apply_edits_with_report(edited, &[stale, fresh]);
        assert_eq!(report.content, "keep THIS\nCHANGED\n");
        assert_eq!(report.applied, vec![1]);
        assert_eq!(report.stale, vec![0]);
        assert!(report.changed());
    }

    #[test]
    fn test_offset_past_end_is_stale() {
        let block = matched("tail", "x", "head tail");
        let report = apply_edits_with_report("head", &[block]);
        assert_eq!(report.content, "head");
        assert_eq!(report.stale, vec![0]);
        assert!(!report.changed());
    }

    #[test]
    fn test_huge_offset_is_stale_not_a_panic() {
        let mut block = EditBlock::new("abc", "x");
        block.matched = true;
        block.match_index = Some(usize::MAX - 1);
        block.matched_text = Some("abc".into());
        let report = apply_edits_with_report("abc", &[block]);
        assert_eq!(report.content, "abc");
        assert_eq!(report.stale, vec![0]);
    }

    #[test]
    fn test_unmatched_blocks_are_reported() {
        let doc = "abc";
        let report =
            apply_edits_with_report(doc, &[matched("zzz", "y", doc), matched("b", "B", doc)]);
        assert_eq!(report.content, "aBc");
        assert_eq!(report.unmatched, vec![0]);
        assert_eq!(report.applied, vec![1]);
    }

    #[test]
    fn test_overlapping_blocks_first_from_the_end_wins() {
        let doc = "alpha beta gamma";
        let a = matched("alpha beta", "X", doc);
        let b = matched("beta gamma", "Y", doc);
        let report = apply_edits_with_report(doc, &[a, b]);
        assert_eq!(report.content, "alpha Y");
        assert_eq!(report.applied, vec![1]);
        assert_eq!(report.stale, vec![0]);
    }

    #[test]
    fn test_multibyte_offsets() {
        let doc = "héllo wörld";
        let block = matched("wörld", "world", doc);
        assert_eq!(apply_edits(doc, &[block]), "héllo world");
    }

    #[test]
    fn test_report_json_shape() {
        let doc = "abc";
        let report = apply_edits_with_report(doc, &[matched("b", "B", doc)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["content"], "aBc");
        assert_eq!(json["applied"], serde_json::json!([0]));
        assert_eq!(json["stale"], serde_json::json!([]));
    }

    #[test]
    fn test_stats_are_line_deltas() {
        let blocks = vec![
            EditBlock::new("a", "a\nb\nc"),
            EditBlock::new("x\ny", "z"),
            EditBlock::new("same", "different"),
        ];
        assert_eq!(
            compute_edit_stats(&blocks),
            EditStats {
                insertions: 2,
                deletions: 1
            }
        );
    }
}
