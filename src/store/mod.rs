//! The storage abstraction: a capability set the retriever, lifecycle,
//! effectiveness, and concept managers depend on, never on a concrete
//! implementation.
//!
//! [`Store`] is implemented by [`sqlite::SqliteStore`] for production use and
//! by [`memory::MemoryStore`] as an in-memory test double — both honor the
//! same atomicity and lexical-index contracts described in the module docs
//! below, so the rest of the crate is substitutable-implementation-agnostic.

pub mod memory;
pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Concept, Learning, Scope, TaskOutcome};

pub use sqlite::SqliteStore;

/// Unified storage backend trait for the learning memory core.
///
/// All operations are async: the production implementation talks to an
/// embedded SQL engine, and keeping the trait async lets the in-memory test
/// double share call sites without special-casing.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new learning. Fails with [`crate::error::Error::DuplicateId`]
    /// if `learning.id` already exists.
    async fn create(&self, learning: &Learning) -> Result<()>;

    /// Fetch a learning by id. `None` means not found (not an error).
    async fn get(&self, id: &str) -> Result<Option<Learning>>;

    /// Replace a learning by id. Fails with
    /// [`crate::error::Error::NotFound`] if it doesn't exist.
    async fn update(&self, learning: &Learning) -> Result<()>;

    /// Delete a learning by id, cascading its concept links. Fails with
    /// [`crate::error::Error::NotFound`] if it doesn't exist.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Lexical search over `condition`/`action`/`outcome`, ranked by the
    /// index, unrestricted by scope.
    async fn search(&self, query: &str) -> Result<Vec<Learning>>;

    /// Like [`Store::search`], restricted to the given scopes. An empty
    /// `scopes` slice returns an empty result, not "all scopes".
    async fn search_by_scope(&self, query: &str, scopes: &[Scope]) -> Result<Vec<Learning>>;

    /// Most recent `limit` learnings by `created_at` descending.
    async fn list(&self, limit: usize) -> Result<Vec<Learning>>;

    /// Like [`Store::list`], restricted to the given scopes.
    async fn list_by_scope(&self, scopes: &[Scope], limit: usize) -> Result<Vec<Learning>>;

    /// Case-insensitive substring match on `condition`, most recent first.
    async fn search_by_condition(&self, pattern: &str) -> Result<Vec<Learning>>;

    /// Case-insensitive substring match on `condition` for text containing
    /// `prefix` (used for file/directory path hints).
    async fn search_by_path(&self, prefix: &str) -> Result<Vec<Learning>>;

    /// Every learning currently stored, in no particular order. Used
    /// internally by the lifecycle and effectiveness managers, which need to
    /// scan the full set rather than a bounded/ranked slice.
    async fn all(&self) -> Result<Vec<Learning>>;

    /// Atomically `trigger_count += 1` and `last_triggered := now`.
    async fn increment_trigger_count(&self, id: &str, now: DateTime<Utc>) -> Result<()>;

    /// Delete all listed ids in a single write transaction. Unknown ids are
    /// ignored. Returns the number actually deleted.
    async fn delete_many(&self, ids: &[String]) -> Result<u64>;

    /// Upsert the task outcome row and apply it to every still-existing
    /// learning named in `outcome.learnings_used`, all in a single
    /// transaction: either every update lands, or none does. Learnings that
    /// no longer exist are skipped, not an error.
    async fn record_outcome(&self, outcome: &TaskOutcome) -> Result<()>;

    /// Fetch a task outcome by id.
    async fn get_task_outcome(&self, task_id: &str) -> Result<Option<TaskOutcome>>;

    /// Insert a new concept. Fails with
    /// [`crate::error::Error::UniqueConstraint`] if `name` is already taken.
    async fn create_concept(&self, concept: &Concept) -> Result<()>;

    /// Fetch a concept by id.
    async fn get_concept(&self, id: &str) -> Result<Option<Concept>>;

    /// Fetch a concept by its unique name.
    async fn get_concept_by_name(&self, name: &str) -> Result<Option<Concept>>;

    /// Delete a concept by id, cascading its links. Fails with
    /// [`crate::error::Error::NotFound`] if it doesn't exist.
    async fn delete_concept(&self, id: &str) -> Result<()>;

    /// All concepts, ordered by name.
    async fn list_concepts(&self) -> Result<Vec<Concept>>;

    /// Link a learning to a concept. Idempotent: re-adding an existing link
    /// is a no-op success.
    async fn add_link(&self, learning_id: &str, concept_id: &str) -> Result<()>;

    /// Remove a link. Fails with [`crate::error::Error::NotFound`] if it
    /// doesn't exist.
    async fn remove_link(&self, learning_id: &str, concept_id: &str) -> Result<()>;

    /// Concept ids linked to a learning.
    async fn concepts_for_learning(&self, learning_id: &str) -> Result<Vec<String>>;

    /// Learning ids linked to a concept.
    async fn learnings_for_concept(&self, concept_id: &str) -> Result<Vec<String>>;
}
