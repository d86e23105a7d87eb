//! Condition → Action → Outcome learning memory: capture, store, retrieve,
//! and score the lessons an agent accumulates across tasks in a repository.
//!
//! [`facade::LearningMemory`] is the entry point most callers need; the
//! other modules are public so embedders can compose their own pipeline
//! around a single component (a custom retriever over [`store::Store`], for
//! instance) instead of the full facade.

pub mod capture;
pub mod clock;
pub mod concepts;
pub mod config;
pub mod effectiveness;
pub mod error;
pub mod facade;
pub mod import_export;
pub mod lifecycle;
pub mod parser;
pub mod retrieval;
pub mod store;
pub mod types;

pub use clock::Clock;
pub use concepts::ConceptManager;
pub use config::{MemoryConfig, StorageLocation};
pub use effectiveness::EffectivenessTracker;
pub use error::{Error, Result};
pub use facade::LearningMemory;
pub use lifecycle::LifecycleManager;
pub use retrieval::{RankingWeights, Retriever};
pub use store::Store;
pub use types::{CaoTriple, Concept, Learning, OutcomeType, Scope, TaskOutcome, TaskOutcomeKind, VerificationStatus};
