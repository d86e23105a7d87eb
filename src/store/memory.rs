//! In-memory [`Store`] implementation used as a test double. It honors the
//! same atomicity contracts as [`super::sqlite::SqliteStore`] but uses
//! naive substring matching in place of FTS5, which is sufficient for
//! exercising retrieval/lifecycle/effectiveness logic without an embedded
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{Concept, Learning, Scope, TaskOutcome};

use super::Store;

#[derive(Default)]
struct Inner {
    learnings: HashMap<String, Learning>,
    concepts: HashMap<String, Concept>,
    links: Vec<(String, String)>,
    task_outcomes: HashMap<String, TaskOutcome>,
}

/// A non-persistent store guarded by a single `RwLock`, mirroring the
/// read/write split of the production backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_keywords(haystack: &str, query: &str) -> bool {
    let haystack = haystack.to_lowercase();
    query
        .split_whitespace()
        .any(|term| haystack.contains(&term.to_lowercase()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, learning: &Learning) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.learnings.contains_key(&learning.id) {
            return Err(Error::DuplicateId(learning.id.clone()));
        }
        inner.learnings.insert(learning.id.clone(), learning.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Learning>> {
        Ok(self.inner.read().await.learnings.get(id).cloned())
    }

    async fn update(&self, learning: &Learning) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.learnings.contains_key(&learning.id) {
            return Err(Error::NotFound(learning.id.clone()));
        }
        inner.learnings.insert(learning.id.clone(), learning.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.learnings.remove(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        inner.links.retain(|(l, _)| l != id);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Learning>> {
        let inner = self.inner.read().await;
        Ok(inner
            .learnings
            .values()
            .filter(|l| matches_keywords(&l.indexed_text(), query))
            .cloned()
            .collect())
    }

    async fn search_by_scope(&self, query: &str, scopes: &[Scope]) -> Result<Vec<Learning>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        Ok(inner
            .learnings
            .values()
            .filter(|l| scopes.contains(&l.scope) && matches_keywords(&l.indexed_text(), query))
            .cloned()
            .collect())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Learning>> {
        let inner = self.inner.read().await;
        let mut all: Vec<Learning> = inner.learnings.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn list_by_scope(&self, scopes: &[Scope], limit: usize) -> Result<Vec<Learning>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        let mut matching: Vec<Learning> = inner
            .learnings
            .values()
            .filter(|l| scopes.contains(&l.scope))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn search_by_condition(&self, pattern: &str) -> Result<Vec<Learning>> {
        let inner = self.inner.read().await;
        let pattern = pattern.to_lowercase();
        let mut out: Vec<Learning> = inner
            .learnings
            .values()
            .filter(|l| l.condition.to_lowercase().contains(&pattern))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn search_by_path(&self, prefix: &str) -> Result<Vec<Learning>> {
        self.search_by_condition(prefix).await
    }

    async fn all(&self) -> Result<Vec<Learning>> {
        Ok(self.inner.read().await.learnings.values().cloned().collect())
    }

    async fn increment_trigger_count(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let learning = inner
            .learnings
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        learning.trigger_count += 1;
        learning.last_triggered = Some(now);
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut removed = 0u64;
        for id in ids {
            if inner.learnings.remove(id).is_some() {
                removed += 1;
                inner.links.retain(|(l, _)| l != id);
            }
        }
        Ok(removed)
    }

    async fn record_outcome(&self, outcome: &TaskOutcome) -> Result<()> {
        let mut inner = self.inner.write().await;
        let is_success = outcome.is_success();
        inner.task_outcomes.insert(outcome.task_id.clone(), outcome.clone());

        for learning_id in &outcome.learnings_used {
            let Some(learning) = inner.learnings.get_mut(learning_id) else {
                continue;
            };
            if is_success {
                learning.success_count += 1;
            } else {
                learning.failure_count += 1;
            }
            learning.recompute_effectiveness();
        }
        Ok(())
    }

    async fn get_task_outcome(&self, task_id: &str) -> Result<Option<TaskOutcome>> {
        Ok(self.inner.read().await.task_outcomes.get(task_id).cloned())
    }

    async fn create_concept(&self, concept: &Concept) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.concepts.values().any(|c| c.name == concept.name) {
            return Err(Error::UniqueConstraint(format!(
                "concept name already exists: {}",
                concept.name
            )));
        }
        inner.concepts.insert(concept.id.clone(), concept.clone());
        Ok(())
    }

    async fn get_concept(&self, id: &str) -> Result<Option<Concept>> {
        Ok(self.inner.read().await.concepts.get(id).cloned())
    }

    async fn get_concept_by_name(&self, name: &str) -> Result<Option<Concept>> {
        Ok(self
            .inner
            .read()
            .await
            .concepts
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn delete_concept(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.concepts.remove(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        inner.links.retain(|(_, c)| c != id);
        Ok(())
    }

    async fn list_concepts(&self) -> Result<Vec<Concept>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Concept> = inner.concepts.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn add_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (learning_id.to_string(), concept_id.to_string());
        if !inner.links.contains(&key) {
            inner.links.push(key);
        }
        Ok(())
    }

    async fn remove_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (learning_id.to_string(), concept_id.to_string());
        let before = inner.links.len();
        inner.links.retain(|l| l != &key);
        if inner.links.len() == before {
            return Err(Error::NotFound(format!("link {learning_id}/{concept_id}")));
        }
        Ok(())
    }

    async fn concepts_for_learning(&self, learning_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .links
            .iter()
            .filter(|(l, _)| l == learning_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn learnings_for_concept(&self, concept_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .links
            .iter()
            .filter(|(_, c)| c == concept_id)
            .map(|(l, _)| l.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutcomeType;

    fn sample(id: &str) -> Learning {
        Learning {
            id: id.to_string(),
            condition: "tests fail with timeout".into(),
            action: "increase timeout".into(),
            outcome: "tests pass".into(),
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

    #[tokio::test]
    async fn create_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.create(&sample("a")).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_keywords_in_indexed_text() {
        let store = MemoryStore::new();
        store.create(&sample("a")).await.unwrap();
        assert_eq!(store.search("timeout").await.unwrap().len(), 1);
        assert!(store.search("unrelated").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_scope_slice_returns_empty() {
        let store = MemoryStore::new();
        store.create(&sample("a")).await.unwrap();
        assert!(store.list_by_scope(&[], 10).await.unwrap().is_empty());
    }
}
