//! Candidate gathering and ranking over a [`crate::store::Store`].
//!
//! The retriever never mutates the store; recording that a returned
//! learning was actually used is the caller's responsibility (the facade
//! does it on task start).

pub mod bm25;
pub mod scoring;
pub mod tokenize;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::store::Store;
use crate::types::{Learning, Scope};

use bm25::Document;
pub use scoring::RankingWeights;

/// Default cap on [`Retriever::retrieve_for_task`] results when a
/// [`Retriever`] is constructed without an explicit one.
pub const DEFAULT_RESULT_CAP: usize = 5;

/// Queries a [`Store`] for candidates and ranks them by the composite
/// score. Holds no mutable state beyond its configured weights and cap.
pub struct Retriever<S: Store + ?Sized> {
    store: Arc<S>,
    weights: RankingWeights,
    default_cap: usize,
}

impl<S: Store + ?Sized> Retriever<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            weights: RankingWeights::default(),
            default_cap: DEFAULT_RESULT_CAP,
        }
    }

    #[must_use]
    pub fn with_weights(store: Arc<S>, weights: RankingWeights) -> Self {
        Self {
            store,
            weights,
            default_cap: DEFAULT_RESULT_CAP,
        }
    }

    #[must_use]
    pub fn with_config(store: Arc<S>, weights: RankingWeights, default_cap: usize) -> Self {
        Self { store, weights, default_cap }
    }

    /// Gather candidates for a task description plus optional file-path
    /// hints, returning up to `default_cap` learnings ranked by composite
    /// score.
    pub async fn retrieve_for_task(
        &self,
        description: &str,
        scopes: Option<&[Scope]>,
        path_hints: &[String],
    ) -> Result<Vec<Learning>> {
        let mut candidates = self.gather_candidates(description, scopes, path_hints).await?;
        let ranked = self.rank(&mut candidates, description);
        Ok(ranked.into_iter().take(self.default_cap).collect())
    }

    /// Like [`Self::retrieve_for_task`], but additionally unions a raw
    /// substring match on `msg` and returns every ranked match uncapped.
    pub async fn retrieve_for_error(&self, msg: &str, scopes: Option<&[Scope]>) -> Result<Vec<Learning>> {
        let mut candidates = self.gather_candidates(msg, scopes, &[]).await?;

        let substring_matches = self.store.search_by_condition(msg).await?;
        let mut seen: std::collections::HashSet<String> =
            candidates.iter().map(|l| l.id.clone()).collect();
        for m in substring_matches {
            if seen.insert(m.id.clone()) {
                candidates.push(m);
            }
        }

        Ok(self.rank(&mut candidates, msg))
    }

    async fn gather_candidates(
        &self,
        text: &str,
        scopes: Option<&[Scope]>,
        path_hints: &[String],
    ) -> Result<Vec<Learning>> {
        let keywords = tokenize::candidate_keywords(text);
        let mut by_id: HashMap<String, Learning> = HashMap::new();

        if !keywords.is_empty() {
            let query = keywords.join(" ");
            let hits = match scopes {
                Some(scopes) => self.store.search_by_scope(&query, scopes).await?,
                None => self.store.search(&query).await?,
            };
            for hit in hits {
                by_id.insert(hit.id.clone(), hit);
            }
        }

        for hint in path_hints {
            let prefix = path_prefix(hint);
            if prefix.is_empty() {
                continue;
            }
            for hit in self.store.search_by_path(&prefix).await? {
                by_id.insert(hit.id.clone(), hit);
            }
        }

        Ok(by_id.into_values().collect())
    }

    fn rank(&self, candidates: &mut [Learning], query_text: &str) -> Vec<Learning> {
        let query_terms = tokenize::query_terms(query_text);
        let docs: Vec<Vec<String>> = candidates
            .iter()
            .map(|l| tokenize::document_tokens(&l.indexed_text()))
            .collect();
        let corpus: Vec<Document<'_>> = docs.iter().map(|tokens| Document { tokens }).collect();
        let bm25_scores = bm25::score_corpus(&corpus, &query_terms, self.weights.bm25);

        let now = Utc::now();
        let mut scored: Vec<(f64, Learning)> = candidates
            .iter()
            .zip(bm25_scores)
            .map(|(l, bm25)| (scoring::composite_score(l, bm25, now, &self.weights), l.clone()))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, l)| l).collect()
    }
}

/// Strip leading separators; if the final segment contains `.`, drop it and
/// keep the directory (empty if there was no directory); otherwise keep the
/// full path.
fn path_prefix(hint: &str) -> String {
    let trimmed = hint.trim_start_matches(['/', '\\']);
    match trimmed.rsplit_once('/') {
        Some((dir, last)) if last.contains('.') => dir.to_string(),
        Some(_) => trimmed.to_string(),
        None if trimmed.contains('.') => String::new(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::OutcomeType;

    fn sample(id: &str, condition: &str) -> Learning {
        Learning {
            id: id.to_string(),
            condition: condition.to_string(),
            action: "do something".into(),
            outcome: "it works".into(),
            commit_hash: None,
            log_snippet_id: None,
            scope: Scope::Repo,
            ttl: std::time::Duration::from_secs(0),
            last_triggered: None,
            trigger_count: 0,
            outcome_type: OutcomeType::Success,
            created_at: Utc::now(),
            success_count: 0,
            failure_count: 0,
            effectiveness: 1.0,
        }
    }

    #[test]
    fn path_prefix_drops_filename_with_extension() {
        assert_eq!(path_prefix("/internal/agent/runner.go"), "internal/agent");
        assert_eq!(path_prefix("internal/agent"), "internal/agent");
        assert_eq!(path_prefix("runner.go"), "");
    }

    #[tokio::test]
    async fn retrieve_for_task_caps_at_five() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..8 {
            store
                .create(&sample(&format!("l{i}"), "tests fail with timeout errors"))
                .await
                .unwrap();
        }
        let retriever = Retriever::new(store);
        let results = retriever.retrieve_for_task("tests fail with timeout", None, &[]).await.unwrap();
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn retrieve_for_task_honors_a_custom_cap() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..8 {
            store
                .create(&sample(&format!("l{i}"), "tests fail with timeout errors"))
                .await
                .unwrap();
        }
        let retriever = Retriever::with_config(store, RankingWeights::default(), 2);
        let results = retriever.retrieve_for_task("tests fail with timeout", None, &[]).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn retrieve_for_error_is_uncapped_and_unions_substring_matches() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..8 {
            store
                .create(&sample(&format!("l{i}"), "panic: index out of range [3] with length 2"))
                .await
                .unwrap();
        }
        let retriever = Retriever::new(store);
        let results = retriever
            .retrieve_for_error("panic: index out of range [3] with length 2", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 8);
    }

    #[tokio::test]
    async fn more_frequently_triggered_learning_ranks_higher_under_equal_text_match() {
        let store = Arc::new(MemoryStore::new());
        let mut frequent = sample("frequent", "tests fail with timeout errors");
        frequent.trigger_count = 20;
        let rare = sample("rare", "tests fail with timeout errors");
        store.create(&frequent).await.unwrap();
        store.create(&rare).await.unwrap();

        let retriever = Retriever::new(store);
        let results = retriever.retrieve_for_task("tests fail with timeout", None, &[]).await.unwrap();
        assert_eq!(results[0].id, "frequent");
    }
}
