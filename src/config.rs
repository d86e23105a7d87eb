//! Resolved, immutable configuration constructed once by the caller and
//! passed into [`crate::facade::LearningMemory::open`]. No component
//! re-derives paths from the environment after construction.

use std::path::{Path, PathBuf};

use crate::lifecycle::DEFAULT_TTL_DAYS;
use crate::retrieval::RankingWeights;

/// Where the database lives, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageLocation {
    /// `<project-root>/.alphie/learnings.db`.
    ProjectLocal(PathBuf),
    /// `$XDG_DATA_HOME/alphie/alphie.db`, falling back to
    /// `$HOME/.local/share/alphie/alphie.db`.
    Global(PathBuf),
}

impl StorageLocation {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            StorageLocation::ProjectLocal(p) | StorageLocation::Global(p) => p,
        }
    }
}

/// Resolved configuration for one [`crate::facade::LearningMemory`]
/// instance.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub storage: StorageLocation,
    pub default_ttl_days: i64,
    pub ranking_weights: RankingWeights,
    pub default_result_cap: usize,
}

impl MemoryConfig {
    /// Project-local storage under `project_root/.alphie/learnings.db`.
    #[must_use]
    pub fn project_local(project_root: &Path) -> Self {
        Self {
            storage: StorageLocation::ProjectLocal(project_root.join(".alphie").join("learnings.db")),
            default_ttl_days: DEFAULT_TTL_DAYS,
            ranking_weights: RankingWeights::default(),
            default_result_cap: 5,
        }
    }

    /// Global storage resolved via `dirs::data_dir()` (XDG on Linux,
    /// falling back to `$HOME/.local/share` when unset).
    #[must_use]
    pub fn global() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        });
        Self {
            storage: StorageLocation::Global(base.join("alphie").join("alphie.db")),
            default_ttl_days: DEFAULT_TTL_DAYS,
            ranking_weights: RankingWeights::default(),
            default_result_cap: 5,
        }
    }
}
