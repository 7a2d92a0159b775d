//! Sliding-window document segmenter.
//!
//! Splits normalized text into overlapping fixed-size word windows so that
//! context survives a split boundary. Window size is controlled directly in
//! words, not tokens; the embedding tokenizer's count is recorded on each
//! chunk but only as a soft target.
//!
//! # Algorithm
//!
//! 1. Tokenize on whitespace.
//! 2. Emit windows of `window_words` consecutive words.
//! 3. Advance by `window_words - overlap_words` per step, so successive
//!    windows overlap by exactly `overlap_words` words.
//! 4. Stop once a window's end reaches the last word; the final window may
//!    be shorter. The loop is iterative with an explicit bound check —
//!    legal documents run to many thousands of words and must segment in
//!    linear time with no call-stack growth.

use anyhow::{bail, Result};

use crate::models::Chunk;

/// Default window size in words.
pub const DEFAULT_WINDOW_WORDS: usize = 300;
/// Default overlap between successive windows, in words.
pub const DEFAULT_OVERLAP_WORDS: usize = 50;

/// Split text into overlapping word windows.
///
/// Returns an empty vec for empty text (blank pages emit no chunks).
///
/// # Errors
///
/// `overlap_words >= window_words` makes the stride non-positive, which
/// would loop forever; it is rejected before iteration begins. Callers
/// must hold `0 <= overlap_words < window_words`.
pub fn segment(text: &str, window_words: usize, overlap_words: usize) -> Result<Vec<String>> {
    if window_words == 0 {
        bail!("window_words must be > 0");
    }
    if overlap_words >= window_words {
        bail!(
            "overlap_words ({}) must be less than window_words ({})",
            overlap_words,
            window_words
        );
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let stride = window_words - overlap_words;
    let mut windows = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + window_words).min(words.len());
        windows.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start += stride;
    }

    Ok(windows)
}

/// Segment one page of a document into labeled chunks.
///
/// Windows are assigned `part = "batch_{i}"` in emission order, `i`
/// starting at 0. `token_count` is supplied by the caller's tokenizer,
/// applied per window via `token_len`.
pub fn chunk_page<F>(
    source_id: &str,
    page: usize,
    text: &str,
    window_words: usize,
    overlap_words: usize,
    token_len: F,
) -> Result<Vec<Chunk>>
where
    F: Fn(&str) -> usize,
{
    let windows = segment(text, window_words, overlap_words)?;
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let token_count = token_len(&text);
            Chunk {
                source_id: source_id.to_string(),
                page,
                part: format!("batch_{}", i),
                text,
                token_count,
            }
        })
        .collect())
}
