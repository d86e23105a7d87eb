//! Word-boundary tokenization shared by candidate gathering, BM25 query
//! construction, and concept suggestion.

use std::collections::HashSet;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "if", "then", "else", "for", "to", "of", "in",
        "on", "at", "by", "with", "from", "is", "are", "was", "were", "be", "been", "being",
        "this", "that", "these", "those", "it", "its", "as", "into", "than", "so", "not", "no",
        "do", "does", "did", "has", "have", "had", "will", "would", "should", "could", "can",
        "may", "might", "must", "shall", "about", "above", "after", "again", "all", "any",
        "because", "before", "between", "both", "during", "each", "further", "here", "how",
        "out", "over", "own", "same", "some", "such", "there", "through", "under", "until",
        "very", "what", "when", "where", "which", "while", "who", "why", "you", "your",
    ]
    .into_iter()
    .collect()
});

fn split_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Tokenize for candidate gathering: lowercased, length ≥ 3, stop-words
/// removed.
#[must_use]
pub fn candidate_keywords(text: &str) -> Vec<String> {
    split_words(text)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Tokenize for BM25 query terms: looser than candidate gathering, keeping
/// tokens of length ≥ 2 and not removing stop-words (the query is scored
/// against a small transient corpus, not filtered for search dispatch).
#[must_use]
pub fn query_terms(text: &str) -> Vec<String> {
    split_words(text).filter(|w| w.chars().count() >= 2).collect()
}

/// Tokenize document text (condition/action/outcome) for BM25 document
/// length and term-frequency purposes. Same looseness as [`query_terms`]
/// since both sides of the BM25 comparison must use compatible tokens.
#[must_use]
pub fn document_tokens(text: &str) -> Vec<String> {
    query_terms(text)
}
