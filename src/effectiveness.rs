//! Records task outcomes against the learnings that were used, maintaining
//! per-learning success/failure counters and surfacing ranked/retirement
//! views over them.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::store::Store;
use crate::types::{Learning, TaskOutcome};

/// Applies task outcomes to learning counters and reports on effectiveness.
pub struct EffectivenessTracker<S: Store + ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> EffectivenessTracker<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Upsert the outcome row and update every still-existing learning named
    /// in `outcome.learnings_used`, in one storage-level transaction.
    pub async fn record_outcome(&self, outcome: &TaskOutcome) -> Result<()> {
        self.store.record_outcome(outcome).await?;
        debug!(task_id = %outcome.task_id, "recorded task outcome");
        Ok(())
    }

    /// Ranked by `effectiveness DESC, uses DESC`, restricted to `uses >= 5`.
    pub async fn top(&self, limit: usize) -> Result<Vec<Learning>> {
        let mut all: Vec<Learning> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|l| l.uses() >= 5)
            .collect();
        all.sort_by(|a, b| {
            b.effectiveness
                .partial_cmp(&a.effectiveness)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.uses().cmp(&a.uses()))
        });
        all.truncate(limit);
        Ok(all)
    }

    /// Ranked by `effectiveness ASC, uses DESC`, restricted to `uses >= 10`.
    pub async fn bottom(&self, limit: usize) -> Result<Vec<Learning>> {
        let mut all: Vec<Learning> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|l| l.uses() >= 10)
            .collect();
        all.sort_by(|a, b| {
            a.effectiveness
                .partial_cmp(&b.effectiveness)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.uses().cmp(&a.uses()))
        });
        all.truncate(limit);
        Ok(all)
    }

    /// Learnings matching `(effectiveness < 0.3 && uses >= 10) || (effectiveness
    /// < 0.2 && uses >= 20)`. Reporting only — never deletes.
    pub async fn retirement_set(&self) -> Result<Vec<Learning>> {
        let candidates = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|l| {
                let uses = l.uses();
                (l.effectiveness < 0.3 && uses >= 10) || (l.effectiveness < 0.2 && uses >= 20)
            })
            .collect();
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::{OutcomeType, Scope, TaskOutcomeKind, VerificationStatus};
    use chrono::Utc;

    fn sample(id: &str) -> Learning {
        Learning {
            id: id.to_string(),
            condition: "c".into(),
            action: "a".into(),
            outcome: "o".into(),
            commit_hash: None,
            log_snippet_id: None,
            scope: Scope::Repo,
            ttl: std::time::Duration::from_secs(0),
            last_triggered: None,
            trigger_count: 0,
            outcome_type: OutcomeType::Neutral,
            created_at: Utc::now(),
            success_count: 0,
            failure_count: 0,
            effectiveness: 1.0,
        }
    }

    fn outcome(task_id: &str, success: bool, learnings: &[&str]) -> TaskOutcome {
        TaskOutcome {
            task_id: task_id.to_string(),
            session_id: None,
            outcome: if success { TaskOutcomeKind::Success } else { TaskOutcomeKind::Failure },
            verification_passed: if success { VerificationStatus::Pass } else { VerificationStatus::Fail },
            learnings_used: learnings.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_outcome_updates_counters_and_effectiveness() {
        let store = Arc::new(MemoryStore::new());
        store.create(&sample("l1")).await.unwrap();
        let tracker = EffectivenessTracker::new(store.clone());

        tracker.record_outcome(&outcome("t1", true, &["l1"])).await.unwrap();
        tracker.record_outcome(&outcome("t2", false, &["l1"])).await.unwrap();

        let l = store.get("l1").await.unwrap().unwrap();
        assert_eq!(l.success_count, 1);
        assert_eq!(l.failure_count, 1);
        assert_eq!(l.effectiveness, 0.5);
    }

    #[tokio::test]
    async fn record_outcome_ignores_missing_learnings_without_erroring() {
        let store = Arc::new(MemoryStore::new());
        let tracker = EffectivenessTracker::new(store);
        tracker.record_outcome(&outcome("t1", true, &["ghost"])).await.unwrap();
    }

    #[tokio::test]
    async fn top_excludes_learnings_under_five_uses() {
        let store = Arc::new(MemoryStore::new());
        let mut l = sample("l1");
        l.success_count = 3;
        l.recompute_effectiveness();
        store.create(&l).await.unwrap();

        let tracker = EffectivenessTracker::new(store);
        assert!(tracker.top(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retirement_set_flags_low_effectiveness_high_use_learnings() {
        let store = Arc::new(MemoryStore::new());
        let mut struggling = sample("struggling");
        struggling.success_count = 2;
        struggling.failure_count = 10;
        struggling.recompute_effectiveness();
        let mut healthy = sample("healthy");
        healthy.success_count = 9;
        healthy.failure_count = 1;
        healthy.recompute_effectiveness();
        store.create(&struggling).await.unwrap();
        store.create(&healthy).await.unwrap();

        let tracker = EffectivenessTracker::new(store);
        let retirement = tracker.retirement_set().await.unwrap();
        assert_eq!(retirement.len(), 1);
        assert_eq!(retirement[0].id, "struggling");
    }
}
