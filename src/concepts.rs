//! Tagging: CRUD on concepts, learning-concept links, and keyword-overlap
//! suggestion.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::retrieval::tokenize;
use crate::store::Store;
use crate::types::Concept;

/// Manages concepts and their links to learnings over a [`Store`].
pub struct ConceptManager<S: Store + ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> ConceptManager<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a new concept, generating its id. Fails `UniqueConstraint` if
    /// `name` is already taken.
    pub async fn create(&self, name: &str, summary: Option<String>) -> Result<Concept> {
        let concept = Concept {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            summary,
            created_at: chrono::Utc::now(),
        };
        self.store.create_concept(&concept).await?;
        Ok(concept)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Concept>> {
        self.store.get_concept(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Concept>> {
        self.store.get_concept_by_name(name).await
    }

    /// Delete a concept; the store cascades the link rows.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_concept(id).await
    }

    /// All concepts, ordered by name.
    pub async fn list(&self) -> Result<Vec<Concept>> {
        self.store.list_concepts().await
    }

    /// Idempotent: re-adding an existing link is a no-op success.
    pub async fn add_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        self.store.add_link(learning_id, concept_id).await
    }

    /// Fails `NotFound` if the link doesn't exist.
    pub async fn remove_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        self.store.remove_link(learning_id, concept_id).await
    }

    pub async fn concepts_for_learning(&self, learning_id: &str) -> Result<Vec<String>> {
        self.store.concepts_for_learning(learning_id).await
    }

    pub async fn learnings_by_concept(&self, concept_id: &str) -> Result<Vec<String>> {
        self.store.learnings_for_concept(concept_id).await
    }

    /// Concepts whose `name` or `summary` contains any keyword extracted
    /// from `text` under the same rules as candidate gathering.
    pub async fn suggest_concepts(&self, text: &str) -> Result<Vec<Concept>> {
        let keywords = tokenize::candidate_keywords(text);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let all = self.store.list_concepts().await?;
        Ok(all
            .into_iter()
            .filter(|c| {
                let name = c.name.to_lowercase();
                let summary = c.summary.as_deref().unwrap_or("").to_lowercase();
                keywords.iter().any(|k| name.contains(k) || summary.contains(k))
            })
            .collect())
    }
}
