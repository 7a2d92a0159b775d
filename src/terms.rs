//! Query term extraction for lexical boosting.
//!
//! Pulls domain-significant tokens out of a free-text question: structural
//! citation patterns (`article 14`, `schedule 2`) that embeddings tend to
//! under-weight, plus generic content words as a fallback lexical signal.
//! The fusion engine rewards vector hits whose text contains these terms.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Structural citation patterns, matched case-insensitively.
///
/// Extendable: add a pattern here and every extracted term flows through
/// boosting and the derived `article` label unchanged.
fn citation_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            Regex::new(r"(?i)article\s+\d+").expect("valid regex"),
            Regex::new(r"(?i)schedule\s+\d+").expect("valid regex"),
        ]
    })
}

fn article_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)article\s+(\d+)").expect("valid regex"))
}

/// Extracted query terms, split by kind so the fusion engine can weight
/// exact-citation matches above generic word matches.
#[derive(Debug, Clone, Default)]
pub struct QueryTerms {
    /// Structural citations (`"article 14"`), lower-cased.
    pub citations: HashSet<String>,
    /// Content words of length >= 4, lower-cased.
    pub content_words: HashSet<String>,
}

impl QueryTerms {
    /// Deduplicated union of both term kinds; order is not meaningful.
    pub fn all(&self) -> HashSet<String> {
        self.citations
            .union(&self.content_words)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty() && self.content_words.is_empty()
    }
}

/// Extract domain-significant terms from a free-text query.
pub fn extract_terms(query: &str) -> QueryTerms {
    let mut terms = QueryTerms::default();

    for pattern in citation_patterns() {
        for m in pattern.find_iter(query) {
            // Collapse internal whitespace so "article   14" and
            // "article 14" extract the same term.
            let normalized = m
                .as_str()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            terms.citations.insert(normalized);
        }
    }

    for word in query.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if word.chars().count() >= 4 {
            terms.content_words.insert(word);
        }
    }

    terms
}

/// Derive the structural label for a chunk: the first `article N` citation
/// in its text, normalized to `article_{N}`.
///
/// Indexed as a dedicated keyword-store field so citation queries can be
/// weighted above body text.
pub fn extract_article(text: &str) -> Option<String> {
    article_pattern()
        .captures(text)
        .map(|caps| format!("article_{}", &caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_extraction_case_insensitive() {
        let terms = extract_terms("What does ARTICLE 14 say?");
        assert!(terms.citations.contains("article 14"));
    }

    #[test]
    fn test_schedule_pattern() {
        let terms = extract_terms("rent review under Schedule 2");
        assert!(terms.citations.contains("schedule 2"));
    }

    #[test]
    fn test_content_words_minimum_length() {
        let terms = extract_terms("what does the act say");
        assert!(terms.content_words.contains("what"));
        assert!(terms.content_words.contains("does"));
        assert!(!terms.content_words.contains("the"));
        assert!(!terms.content_words.contains("act"));
        assert!(!terms.content_words.contains("say"));
    }

    #[test]
    fn test_union_deduplicates() {
        let terms = extract_terms("article 14 article 14 termination termination");
        assert_eq!(
            terms.citations,
            HashSet::from(["article 14".to_string()])
        );
        let all = terms.all();
        assert!(all.contains("article 14"));
        assert!(all.contains("termination"));
    }

    #[test]
    fn test_punctuation_stripped_from_content_words() {
        let terms = extract_terms("termination, notice?");
        assert!(terms.content_words.contains("termination"));
        assert!(terms.content_words.contains("notice"));
    }

    #[test]
    fn test_extract_article_label() {
        assert_eq!(
            extract_article("article 14 governs termination"),
            Some("article_14".to_string())
        );
        assert_eq!(
            extract_article("as set out in Article 3 above"),
            Some("article_3".to_string())
        );
        assert_eq!(extract_article("no citation here"), None);
    }

    #[test]
    fn test_empty_query() {
        assert!(extract_terms("").is_empty());
    }
}
