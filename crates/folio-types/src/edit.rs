//! Edit-block shapes produced per chat message. Never persisted.

use serde::{Deserialize, Serialize};

/// One SEARCH/REPLACE directive, plus where (if anywhere) it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBlock {
    /// Text expected to exist in the document.
    pub search: String,
    /// Replacement text.
    pub replace: String,
    pub matched: bool,
    /// Byte offset of the match in the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_index: Option<usize>,
    /// The literal document text that matched. Differs from `search` only
    /// by trailing whitespace when the whitespace-tolerant pass found it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

impl EditBlock {
    /// An unmatched block.
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
            matched: false,
            match_index: None,
            matched_text: None,
        }
    }

    /// Byte span `[start, end)` of the match, if matched. `None` as well when
    /// the end would overflow `usize`.
    pub fn span(&self) -> Option<(usize, usize)> {
        match (self.matched, self.match_index, &self.matched_text) {
            (true, Some(start), Some(text)) => Some((start, start.checked_add(text.len())?)),
            _ => None,
        }
    }
}

/// A piece of a chat message, in original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentSegment {
    Text {
        content: String,
    },
    Edit {
        content: String,
        #[serde(rename = "editIndex")]
        edit_index: usize,
    },
}

/// Line-count delta summary. Not a diff: an edit that keeps the line count
/// reports nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditStats {
    pub insertions: usize,
    pub deletions: usize,
}

/// Everything a renderer needs for one message against one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEdits {
    pub blocks: Vec<EditBlock>,
    pub text_segments: Vec<ContentSegment>,
    pub stats: EditStats,
    /// Pairs of block indices whose matched spans intersect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlaps: Vec<(usize, usize)>,
}

impl ParsedEdits {
    pub fn matched_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.matched).count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.blocks.len() - self.matched_count()
    }
}
