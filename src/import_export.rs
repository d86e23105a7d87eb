//! JSON import/export for portable learning transfer between stores.
//!
//! Import discards original ids (fresh ids are generated to avoid
//! collisions) but uses the original id to detect and skip records that
//! already exist. Concepts are matched by name; an unknown name is created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Learning, OutcomeType, Scope};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportedLearning {
    id: String,
    condition: String,
    action: String,
    outcome: String,
    commit_hash: Option<String>,
    log_snippet_id: Option<String>,
    scope: Scope,
    ttl_secs: u64,
    last_triggered: Option<DateTime<Utc>>,
    trigger_count: u64,
    outcome_type: OutcomeType,
    created_at: DateTime<Utc>,
    success_count: u64,
    failure_count: u64,
    effectiveness: f64,
    concept_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportedConcept {
    name: String,
    summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    version: String,
    exported_at: DateTime<Utc>,
    learnings: Vec<ExportedLearning>,
    concepts: Vec<ExportedConcept>,
}

/// Serialize every learning (with its concept names) and every concept to
/// the interchange JSON format.
pub async fn export_learnings<S: Store + ?Sized>(store: &S) -> Result<String> {
    let learnings = store.all().await?;
    let mut exported_learnings = Vec::with_capacity(learnings.len());

    for l in &learnings {
        let concept_ids = store.concepts_for_learning(&l.id).await?;
        let mut names = Vec::with_capacity(concept_ids.len());
        for id in concept_ids {
            if let Some(c) = store.get_concept(&id).await? {
                names.push(c.name);
            }
        }
        exported_learnings.push(ExportedLearning {
            id: l.id.clone(),
            condition: l.condition.clone(),
            action: l.action.clone(),
            outcome: l.outcome.clone(),
            commit_hash: l.commit_hash.clone(),
            log_snippet_id: l.log_snippet_id.clone(),
            scope: l.scope,
            ttl_secs: l.ttl.as_secs(),
            last_triggered: l.last_triggered,
            trigger_count: l.trigger_count,
            outcome_type: l.outcome_type,
            created_at: l.created_at,
            success_count: l.success_count,
            failure_count: l.failure_count,
            effectiveness: l.effectiveness,
            concept_names: names,
        });
    }

    let concepts = store
        .list_concepts()
        .await?
        .into_iter()
        .map(|c| ExportedConcept { name: c.name, summary: c.summary })
        .collect();

    let envelope = Envelope {
        version: FORMAT_VERSION.to_string(),
        exported_at: Utc::now(),
        learnings: exported_learnings,
        concepts,
    };

    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Import learnings and concepts from `json`, generating fresh ids for each
/// imported learning. Records whose original id already exists in the
/// target store are skipped. Returns the number of learnings imported.
pub async fn import_learnings<S: Store + ?Sized>(store: Arc<S>, json: &str) -> Result<usize> {
    let envelope: Envelope = serde_json::from_str(json).map_err(Error::Serialization)?;

    for concept in &envelope.concepts {
        if store.get_concept_by_name(&concept.name).await?.is_none() {
            let new_concept = crate::types::Concept {
                id: Uuid::new_v4().to_string(),
                name: concept.name.clone(),
                summary: concept.summary.clone(),
                created_at: Utc::now(),
            };
            store.create_concept(&new_concept).await?;
        }
    }

    let mut imported = 0usize;
    for exported in &envelope.learnings {
        if store.get(&exported.id).await?.is_some() {
            continue;
        }

        let learning = Learning {
            id: Uuid::new_v4().to_string(),
            condition: exported.condition.clone(),
            action: exported.action.clone(),
            outcome: exported.outcome.clone(),
            commit_hash: exported.commit_hash.clone(),
            log_snippet_id: exported.log_snippet_id.clone(),
            scope: exported.scope,
            ttl: std::time::Duration::from_secs(exported.ttl_secs),
            last_triggered: exported.last_triggered,
            trigger_count: exported.trigger_count,
            outcome_type: exported.outcome_type,
            created_at: exported.created_at,
            success_count: exported.success_count,
            failure_count: exported.failure_count,
            effectiveness: exported.effectiveness,
        };
        store.create(&learning).await?;

        for name in &exported.concept_names {
            let concept = match store.get_concept_by_name(name).await? {
                Some(c) => c,
                None => {
                    let new_concept = crate::types::Concept {
                        id: Uuid::new_v4().to_string(),
                        name: name.clone(),
                        summary: None,
                        created_at: Utc::now(),
                    };
                    store.create_concept(&new_concept).await?;
                    new_concept
                }
            };
            store.add_link(&learning.id, &concept.id).await?;
        }

        imported += 1;
    }

    Ok(imported)
}
