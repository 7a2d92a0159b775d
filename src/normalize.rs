//! Layout-noise stripping for raw extracted page text.
//!
//! Legal PDFs extract with table borders, rule lines, and dotted
//! table-of-contents leaders that pollute the token stream and hurt both
//! embedding quality and keyword matching. [`normalize`] removes them,
//! collapses whitespace, and lower-cases the result so the text matches
//! the case-insensitive keyword index.

use regex::Regex;
use std::sync::OnceLock;

/// Runs of 3+ dash/underscore/asterisk characters (rule lines, separators).
fn rule_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_*]{3,}").expect("valid regex"))
}

/// Runs of 3+ dots (table-of-contents leaders).
fn dot_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{3,}").expect("valid regex"))
}

/// Box-drawing glyphs that survive PDF table extraction.
fn box_glyphs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[│┌┐└┘├┤┬┴┼─═║╔╗╚╝╠╣╦╩╬]+").expect("valid regex"))
}

/// Strip layout noise from raw extracted text.
///
/// - Replaces rule-line runs, dot runs, and box-drawing glyphs with a space.
/// - Collapses all newline and whitespace runs to single spaces.
/// - Trims and lower-cases the result.
/// - Empty or whitespace-only input returns an empty string, not an error.
///
/// Idempotent: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(raw: &str) -> String {
    let stripped = rule_runs().replace_all(raw, " ");
    let stripped = dot_runs().replace_all(&stripped, " ");
    let stripped = box_glyphs().replace_all(&stripped, " ");

    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
