//! BM25 relevance scoring over a transient corpus.
//!
//! The corpus is never the whole store: callers pass exactly the current
//! candidate set, so document frequencies and average document length are
//! meaningful only for the query at hand.

/// Okapi BM25 parameters, named and shaped after the reference codebase's
/// `RankingWeights` convention so the retriever can expose a single
/// configuration surface for every tunable constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// A document in the transient corpus: its tokenized text, ready for term
/// lookups.
pub struct Document<'a> {
    pub tokens: &'a [String],
}

/// Score every document in `corpus` against `query_terms`, returning one
/// BM25 score per document in the same order. Empty corpus or empty query
/// yields all zeros.
#[must_use]
pub fn score_corpus(corpus: &[Document<'_>], query_terms: &[String], params: Bm25Params) -> Vec<f64> {
    let n = corpus.len();
    if n == 0 || query_terms.is_empty() {
        return vec![0.0; n];
    }

    let avg_len = corpus.iter().map(|d| d.tokens.len() as f64).sum::<f64>() / n as f64;

    corpus
        .iter()
        .map(|doc| {
            let doc_len = doc.tokens.len() as f64;
            query_terms
                .iter()
                .map(|term| {
                    let df = corpus
                        .iter()
                        .filter(|d| d.tokens.iter().any(|t| t == term))
                        .count();
                    if df == 0 {
                        return 0.0;
                    }
                    let idf = (((n as f64 - df as f64 + 0.5) / (df as f64 + 0.5)) + 1.0).ln();
                    let tf = doc.tokens.iter().filter(|t| *t == term).count() as f64;
                    let denom = tf + params.k1 * (1.0 - params.b + params.b * (doc_len / avg_len));
                    if denom == 0.0 {
                        0.0
                    } else {
                        idf * (tf * (params.k1 + 1.0)) / denom
                    }
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn empty_corpus_yields_zero_scores() {
        let scores = score_corpus(&[], &toks(&["timeout"]), Bm25Params::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn empty_query_yields_zero_for_every_document() {
        let a = toks(&["timeout", "retry"]);
        let corpus = vec![Document { tokens: &a }];
        let scores = score_corpus(&corpus, &[], Bm25Params::default());
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn document_matching_more_query_terms_scores_higher() {
        let a = toks(&["timeout", "retry", "network"]);
        let b = toks(&["unrelated", "content", "here"]);
        let corpus = vec![Document { tokens: &a }, Document { tokens: &b }];
        let scores = score_corpus(&corpus, &toks(&["timeout", "retry"]), Bm25Params::default());
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn rare_term_scores_higher_than_common_term() {
        // "common" appears in every doc; "rare" appears in only one.
        let a = toks(&["common", "rare"]);
        let b = toks(&["common", "other"]);
        let c = toks(&["common", "yet", "more"]);
        let corpus = vec![
            Document { tokens: &a },
            Document { tokens: &b },
            Document { tokens: &c },
        ];
        let common_scores = score_corpus(&corpus, &toks(&["common"]), Bm25Params::default());
        let rare_scores = score_corpus(&corpus, &toks(&["rare"]), Bm25Params::default());
        assert!(rare_scores[0] > common_scores[0]);
    }
}
