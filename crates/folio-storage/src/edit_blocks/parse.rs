//! SEARCH/REPLACE block extraction.

use std::sync::LazyLock;

use folio_types::{ContentSegment, EditBlock};
use regex::Regex;

/// Delimiters must start a line. Captures are the search and replace
/// payloads without their final newline.
const EDIT_BLOCK_PATTERN: &str = concat!(
    r"(?ms)^<<<<<<< SEARCH[ \t]*\r?\n",
    r"(.*?)\r?\n?^=======[ \t]*\r?\n",
    r"(.*?)\r?\n?^>>>>>>> REPLACE",
);

static EDIT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EDIT_BLOCK_PATTERN).expect("edit block pattern compiles"));

/// Every block in `text`, in order, none matched yet.
pub fn parse_edit_blocks(text: &str) -> Vec<EditBlock> {
    EDIT_BLOCK
        .captures_iter(text)
        .map(|caps| {
            let search = caps.get(1).map_or("", |m| m.as_str());
            let replace = caps.get(2).map_or("", |m| m.as_str());
            EditBlock::new(search, replace)
        })
        .collect()
}

/// Split `text` into prose and edit segments in their original order.
///
/// Prose is trimmed and empty prose is dropped. Edit segments carry the raw
/// block text and its index into [`parse_edit_blocks`]' output.
pub fn parse_content_segments(text: &str) -> Vec<ContentSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for (edit_index, block) in EDIT_BLOCK.find_iter(text).enumerate() {
        push_text(&mut segments, &text[cursor..block.start()]);
        segments.push(ContentSegment::Edit {
            content: block.as_str().to_string(),
            edit_index,
        });
        cursor = block.end();
    }
    push_text(&mut segments, &text[cursor..]);

    segments
}

fn push_text(segments: &mut Vec<ContentSegment>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(ContentSegment::Text {
            content: trimmed.to_string(),
        });
    }
}
