//! Property-based tests for invariants that must hold across arbitrary
//! sequences of operations: effectiveness accounting, staleness evaluation,
//! and BM25 scoring.

use std::sync::Arc;
use std::time::Duration;

use alphie_memory::retrieval::bm25::{score_corpus, Bm25Params, Document};
use alphie_memory::store::memory::MemoryStore;
use alphie_memory::store::Store;
use alphie_memory::types::{
    Learning, OutcomeType, Scope, TaskOutcome, TaskOutcomeKind, VerificationStatus,
};
use alphie_memory::{Clock, LifecycleManager};
use chrono::Utc;
use proptest::prelude::*;

fn sample_learning(id: &str) -> Learning {
    Learning {
        id: id.to_string(),
        condition: "c".into(),
        action: "a".into(),
        outcome: "o".into(),
        commit_hash: None,
        log_snippet_id: None,
        scope: Scope::Repo,
        ttl: Duration::from_secs(0),
        last_triggered: None,
        trigger_count: 0,
        outcome_type: OutcomeType::Neutral,
        created_at: Utc::now(),
        success_count: 0,
        failure_count: 0,
        effectiveness: 1.0,
    }
}

fn outcome(task_id: usize, success: bool, learning_id: &str) -> TaskOutcome {
    TaskOutcome {
        task_id: task_id.to_string(),
        session_id: None,
        outcome: if success {
            TaskOutcomeKind::Success
        } else {
            TaskOutcomeKind::Failure
        },
        verification_passed: if success {
            VerificationStatus::Pass
        } else {
            VerificationStatus::Fail
        },
        learnings_used: vec![learning_id.to_string()],
        created_at: Utc::now(),
    }
}

proptest! {
    /// Regardless of which arbitrary sequence of successes and failures is
    /// recorded against one learning, `effectiveness` always equals
    /// `success_count / (success_count + failure_count)`, and both counters
    /// track exactly the calls that were made.
    #[test]
    fn effectiveness_matches_ratio_after_any_outcome_sequence(results in proptest::collection::vec(any::<bool>(), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            store.create(&sample_learning("l")).await.unwrap();

            for (i, success) in results.iter().enumerate() {
                store.record_outcome(&outcome(i, *success, "l")).await.unwrap();
            }

            let learning = store.get("l").await.unwrap().unwrap();
            let expected_success = results.iter().filter(|s| **s).count() as u64;
            let expected_failure = results.len() as u64 - expected_success;
            prop_assert_eq!(learning.success_count, expected_success);
            prop_assert_eq!(learning.failure_count, expected_failure);

            if results.is_empty() {
                prop_assert_eq!(learning.effectiveness, 1.0);
            } else {
                let expected = expected_success as f64 / results.len() as f64;
                prop_assert!((learning.effectiveness - expected).abs() < 1e-9);
            }
            Ok(())
        })?;
    }

    /// `record_outcome` against a mix of real and nonexistent learning ids
    /// never errors, and only ever mutates the learnings that actually
    /// exist: the total success+failure count recorded across real
    /// learnings equals the number of outcomes that named one.
    #[test]
    fn record_outcome_skips_unknown_learnings_regardless_of_interleaving(
        hits in proptest::collection::vec(any::<bool>(), 0..20),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            store.create(&sample_learning("real")).await.unwrap();

            let mut expected_uses = 0u64;
            for (i, use_real) in hits.iter().enumerate() {
                let target = if *use_real { "real" } else { "ghost" };
                store.record_outcome(&outcome(i, true, target)).await.unwrap();
                if *use_real {
                    expected_uses += 1;
                }
            }

            let learning = store.get("real").await.unwrap().unwrap();
            prop_assert_eq!(learning.success_count, expected_uses);
            prop_assert_eq!(learning.failure_count, 0);
            Ok(())
        })?;
    }
}

proptest! {
    /// A learning created `age_days` ago with no explicit TTL is stale under
    /// [`LifecycleManager`] exactly when `age_days` exceeds the configured
    /// default TTL, for any default TTL and any age.
    #[test]
    fn staleness_matches_age_versus_default_ttl(age_days in 0i64..400, default_ttl_days in 1i64..400) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let mut learning = sample_learning("l");
            learning.created_at = Utc::now() - chrono::Duration::days(age_days);
            store.create(&learning).await.unwrap();

            let lifecycle = LifecycleManager::with_ttl_days(store.clone(), default_ttl_days);
            let removed = lifecycle.cleanup_stale().await.unwrap();

            prop_assert_eq!(removed == 1, age_days > default_ttl_days);
            Ok(())
        })?;
    }

    /// A learning's own nonzero TTL always takes precedence over the
    /// manager's default, regardless of how far apart the two are.
    #[test]
    fn explicit_ttl_overrides_default_regardless_of_default_value(
        ttl_days in 1i64..200,
        default_ttl_days in 1i64..200,
        age_days in 0i64..200,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let mut learning = sample_learning("l");
            learning.ttl = Duration::from_secs((ttl_days * 86_400) as u64);
            learning.created_at = Utc::now() - chrono::Duration::days(age_days);
            store.create(&learning).await.unwrap();

            let lifecycle = LifecycleManager::with_ttl_days(store.clone(), default_ttl_days);
            let removed = lifecycle.cleanup_stale().await.unwrap();

            prop_assert_eq!(removed == 1, age_days > ttl_days);
            Ok(())
        })?;
    }
}

proptest! {
    /// BM25 scores are never negative, and an empty query or empty corpus
    /// always yields an all-zero vector of the right length, for any corpus
    /// of single-token documents and any query drawn from the same
    /// vocabulary.
    #[test]
    fn bm25_scores_are_nonnegative_and_length_matches_corpus(
        doc_words in proptest::collection::vec(0usize..5, 1..12),
        query_words in proptest::collection::vec(0usize..5, 0..4),
    ) {
        let vocab = ["timeout", "retry", "network", "panic", "deadlock"];
        let docs: Vec<Vec<String>> = doc_words
            .iter()
            .map(|w| vec![vocab[*w].to_string()])
            .collect();
        let corpus: Vec<Document<'_>> = docs.iter().map(|tokens| Document { tokens }).collect();
        let query: Vec<String> = query_words.iter().map(|w| vocab[*w].to_string()).collect();

        let scores = score_corpus(&corpus, &query, Bm25Params::default());

        prop_assert_eq!(scores.len(), corpus.len());
        for score in &scores {
            prop_assert!(*score >= 0.0);
        }
        if query.is_empty() {
            prop_assert!(scores.iter().all(|s| *s == 0.0));
        }
    }
}
