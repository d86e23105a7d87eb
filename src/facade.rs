//! The single entry point embedding callers use: [`LearningMemory`] wires the
//! store to the retriever, lifecycle manager, effectiveness tracker, and
//! concept manager, and delegates every public operation to the matching
//! component.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::capture::{self, SuggestedLearning};
use crate::concepts::ConceptManager;
use crate::config::MemoryConfig;
use crate::effectiveness::EffectivenessTracker;
use crate::error::Result;
use crate::import_export;
use crate::lifecycle::LifecycleManager;
use crate::retrieval::Retriever;
use crate::store::{SqliteStore, Store};
use crate::types::{CaoTriple, Learning, OutcomeType, Scope, TaskOutcome};

/// Owns a [`SqliteStore`] and every component that operates over it.
///
/// Construct one per process (or per project, for project-local storage) via
/// [`LearningMemory::open`]; the facade is the only thing most callers need
/// to import.
pub struct LearningMemory {
    store: Arc<SqliteStore>,
    retriever: Retriever<SqliteStore>,
    lifecycle: LifecycleManager<SqliteStore>,
    effectiveness: EffectivenessTracker<SqliteStore>,
    concepts: ConceptManager<SqliteStore>,
}

impl LearningMemory {
    /// Open the store at `config`'s resolved path, run pending migrations,
    /// and perform a best-effort stale-record sweep. A cleanup failure is
    /// logged and otherwise ignored: it must never block startup.
    pub async fn open(config: &MemoryConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(config.storage.path()).await?);
        let memory = Self::from_store(store, config);

        if let Err(err) = memory.lifecycle.cleanup_stale().await {
            warn!(error = %err, "startup stale cleanup failed");
        }

        Ok(memory)
    }

    /// Open an in-memory store, useful for short-lived embeddings and tests
    /// that don't want a file on disk.
    pub async fn open_in_memory(config: &MemoryConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open_in_memory().await?);
        Ok(Self::from_store(store, config))
    }

    fn from_store(store: Arc<SqliteStore>, config: &MemoryConfig) -> Self {
        Self {
            retriever: Retriever::with_config(store.clone(), config.ranking_weights, config.default_result_cap),
            lifecycle: LifecycleManager::with_ttl_days(store.clone(), config.default_ttl_days),
            effectiveness: EffectivenessTracker::new(store.clone()),
            concepts: ConceptManager::new(store.clone()),
            store,
        }
    }

    /// Retrieve up to 5 learnings relevant to a starting task, recording a
    /// trigger against each on a best-effort basis (a trigger failure is
    /// logged, never surfaced: a missed trigger count must not block the
    /// caller from seeing the learning).
    pub async fn on_task_start(
        &self,
        description: &str,
        file_hints: &[String],
    ) -> Result<Vec<Learning>> {
        let learnings = self.retriever.retrieve_for_task(description, None, file_hints).await?;
        for l in &learnings {
            if let Err(err) = self.lifecycle.record_trigger(&l.id).await {
                warn!(id = %l.id, error = %err, "failed to record trigger");
            }
        }
        Ok(learnings)
    }

    /// Retrieve every learning matching a failure message, uncapped, with
    /// the same best-effort trigger recording as [`Self::on_task_start`].
    pub async fn on_failure(&self, message: &str) -> Result<Vec<Learning>> {
        let learnings = self.retriever.retrieve_for_error(message, None).await?;
        for l in &learnings {
            if let Err(err) = self.lifecycle.record_trigger(&l.id).await {
                warn!(id = %l.id, error = %err, "failed to record trigger");
            }
        }
        Ok(learnings)
    }

    /// Record the outcome of a completed task against the learnings it used.
    pub async fn on_task_complete(&self, outcome: &TaskOutcome) -> Result<()> {
        self.effectiveness.record_outcome(outcome).await
    }

    /// Validate and store a new learning with caller-confirmed content,
    /// linking it to the named concepts (creating any that don't yet
    /// exist).
    pub async fn add_learning(&self, cao: CaoTriple, concept_names: &[String]) -> Result<Learning> {
        let learning = Learning {
            id: Uuid::new_v4().to_string(),
            condition: cao.condition,
            action: cao.action,
            outcome: cao.outcome,
            commit_hash: None,
            log_snippet_id: None,
            scope: Scope::Repo,
            ttl: std::time::Duration::from_secs(0),
            last_triggered: None,
            trigger_count: 0,
            outcome_type: OutcomeType::Neutral,
            created_at: chrono::Utc::now(),
            success_count: 0,
            failure_count: 0,
            effectiveness: 1.0,
        };
        self.store.create(&learning).await?;

        for name in concept_names {
            let concept = match self.concepts.get_by_name(name).await? {
                Some(c) => c,
                None => self.concepts.create(name, None).await?,
            };
            self.concepts.add_link(&learning.id, &concept.id).await?;
        }

        Ok(learning)
    }

    /// Match failure text against the fixed pattern library, returning
    /// draft learnings for the caller to review before confirming via
    /// [`Self::add_learning`].
    #[must_use]
    pub fn capture_failure(&self, message: &str) -> Vec<SuggestedLearning> {
        capture::analyze_failure(message)
    }

    /// Serialize every learning and concept to the interchange JSON format.
    pub async fn export_learnings(&self) -> Result<String> {
        import_export::export_learnings(self.store.as_ref()).await
    }

    /// Import learnings and concepts from the interchange JSON format,
    /// returning the number of learnings actually imported (duplicates of
    /// an existing id are skipped).
    pub async fn import_learnings(&self, json: &str) -> Result<usize> {
        import_export::import_learnings(self.store.clone(), json).await
    }

    /// Delete every learning whose staleness predicate currently holds.
    pub async fn cleanup_stale(&self) -> Result<u64> {
        self.lifecycle.cleanup_stale().await
    }

    /// Composition snapshot over the whole store.
    pub async fn health_stats(&self) -> Result<crate::lifecycle::HealthStats> {
        self.lifecycle.health_stats().await
    }

    /// Direct access to the concept manager, for callers managing concepts
    /// outside of [`Self::add_learning`].
    #[must_use]
    pub fn concepts(&self) -> &ConceptManager<SqliteStore> {
        &self.concepts
    }

    /// Direct access to the effectiveness tracker, for ranked/retirement
    /// views over learning usage.
    #[must_use]
    pub fn effectiveness(&self) -> &EffectivenessTracker<SqliteStore> {
        &self.effectiveness
    }

    /// Release the underlying storage handle. After this call the instance
    /// must not be used again.
    pub fn close(self) {
        drop(self);
    }
}
