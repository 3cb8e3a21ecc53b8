//! Locating search payloads in a document.

use folio_types::EditBlock;

/// Match every block against `doc`, returning updated copies.
///
/// Each block is tried as an exact substring first, then line by line with
/// trailing whitespace ignored on both sides. Leading whitespace always
/// counts. `match_index` is a byte offset into `doc`.
pub fn match_blocks_to_document(blocks: &[EditBlock], doc: &str) -> Vec<EditBlock> {
    blocks.iter().map(|block| match_block(block, doc)).collect()
}

fn match_block(block: &EditBlock, doc: &str) -> EditBlock {
    let mut matched = EditBlock::new(block.search.clone(), block.replace.clone());

    let found = match doc.find(&block.search) {
        Some(index) => Some((index, block.search.clone())),
        None => find_trimmed_lines(doc, &block.search),
    };
    if let Some((index, text)) = found {
        matched.matched = true;
        matched.match_index = Some(index);
        matched.matched_text = Some(text);
    }
    matched
}

/// Slide a window of the search's line count over the document, comparing
/// right-trimmed lines. On a hit, return the byte offset of the window and
/// the document's own text for it, trailing whitespace included.
fn find_trimmed_lines(doc: &str, search: &str) -> Option<(usize, String)> {
    let wanted: Vec<&str> = search.split('\n').map(str::trim_end).collect();
    let lines: Vec<&str> = doc.split('\n').collect();
    if wanted.len() > lines.len() {
        return None;
    }

    let mut offsets = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in &lines {
        offsets.push(offset);
        offset += line.len() + 1;
    }

    (0..=lines.len() - wanted.len()).find_map(|start| {
        let window = &lines[start..start + wanted.len()];
        let hit = window
            .iter()
            .zip(&wanted)
            .all(|(line, want)| line.trim_end() == *want);
        if !hit {
            return None;
        }
        let last = start + wanted.len() - 1;
        let begin = offsets[start];
        let end = offsets[last] + lines[last].len();
        Some((begin, doc[begin..end].to_string()))
    })
}

/// Index pairs `(i, j)`, `i < j`, of matched blocks whose spans intersect.
///
/// Apply doesn't act on this; overlapping blocks still go through the
/// stale-text check one at a time.
pub fn find_overlaps(blocks: &[EditBlock]) -> Vec<(usize, usize)> {
    let spans: Vec<(usize, (usize, usize))> = blocks
        .iter()
        .enumerate()
        .filter_map(|(i, block)| block.span().map(|span| (i, span)))
        .collect();

    let mut overlaps = Vec::new();
    for (a, &(i, (start_i, end_i))) in spans.iter().enumerate() {
        for &(j, (start_j, end_j)) in &spans[a + 1..] {
            if start_i < end_j && start_j < end_i {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}
