//! Sentence-aware text splitting with bounded overlap.
//!
//! Lengths and offsets are counted in characters (Unicode scalar values),
//! never bytes, so multi-byte text is never cut inside a code point.

use policygraph_shared::{PolicyGraphError, Result};

/// One piece of split text, with char offsets into the trimmed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPiece {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Characters that end a sentence when followed by whitespace.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Reject option combinations that cannot guarantee forward progress.
pub fn validate_split_options(max_chars: usize, overlap_chars: usize) -> Result<()> {
    if max_chars == 0 {
        return Err(PolicyGraphError::validation("max_chunk_chars must be greater than zero"));
    }
    if overlap_chars >= max_chars {
        return Err(PolicyGraphError::validation(format!(
            "overlap_chars ({overlap_chars}) must be smaller than max_chunk_chars ({max_chars})"
        )));
    }
    Ok(())
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Cuts prefer a sentence end, then whitespace, then a hard cut at the
/// limit. Each following piece re-reads at most `overlap_chars` characters
/// of its predecessor, starting on a word boundary.
pub fn split_text(text: &str, max_chars: usize, overlap_chars: usize) -> Result<Vec<TextPiece>> {
    validate_split_options(max_chars, overlap_chars)?;

    let chars: Vec<char> = text.trim().chars().collect();
    let len = chars.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    if len <= max_chars {
        return Ok(vec![piece(&chars, 0, len)]);
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let limit = start + max_chars;
        if limit >= len {
            pieces.push(piece(&chars, start, len));
            break;
        }

        let cut = find_split_point(&chars, start, limit);
        pieces.push(piece(&chars, start, cut));
        start = next_start(&chars, start, cut, overlap_chars);
    }

    pieces.retain(|p| !p.text.is_empty());
    Ok(pieces)
}

/// Best cut in `(start, limit]`; `limit < chars.len()`.
fn find_split_point(chars: &[char], start: usize, limit: usize) -> usize {
    for i in (start + 1..=limit).rev() {
        if SENTENCE_TERMINATORS.contains(&chars[i - 1]) && chars[i].is_whitespace() {
            return i;
        }
    }
    for i in (start + 1..=limit).rev() {
        if chars[i].is_whitespace() {
            return i;
        }
    }
    limit
}

/// Where the piece after a cut at `cut` begins.
fn next_start(chars: &[char], start: usize, cut: usize, overlap_chars: usize) -> usize {
    let mut next = cut.saturating_sub(overlap_chars).max(start + 1);
    while next < cut && !is_word_start(chars, next) {
        next += 1;
    }
    while next < chars.len() && chars[next].is_whitespace() {
        next += 1;
    }
    next
}

fn is_word_start(chars: &[char], i: usize) -> bool {
    !chars[i].is_whitespace() && (i == 0 || chars[i - 1].is_whitespace())
}

/// Trimmed slice `[start, end)` with offsets narrowed to the trimmed text.
fn piece(chars: &[char], mut start: usize, mut end: usize) -> TextPiece {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    TextPiece {
        text: chars[start..end].iter().collect(),
        start,
        end,
    }
}
