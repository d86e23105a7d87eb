//! TTL evaluation, trigger recording, cleanup, and health reporting.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::Store;
use crate::types::OutcomeType;

/// Default TTL applied to a learning whose own `ttl` is zero.
pub const DEFAULT_TTL_DAYS: i64 = 90;

/// Snapshot returned by [`LifecycleManager::health_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStats {
    pub total: usize,
    pub active: usize,
    pub stale: usize,
    pub by_outcome_type: HashMap<OutcomeType, usize>,
}

/// Evaluates staleness, records triggers, and reports on the store's
/// composition. Holds an injected [`Clock`] so tests can age records
/// deterministically instead of sleeping.
pub struct LifecycleManager<S: Store + ?Sized> {
    store: Arc<S>,
    clock: Clock,
    default_ttl_days: i64,
}

impl<S: Store + ?Sized> LifecycleManager<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Clock::system(),
            default_ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    /// Like [`Self::new`], with a caller-supplied default TTL in place of
    /// [`DEFAULT_TTL_DAYS`].
    #[must_use]
    pub fn with_ttl_days(store: Arc<S>, default_ttl_days: i64) -> Self {
        Self {
            store,
            clock: Clock::system(),
            default_ttl_days,
        }
    }

    #[must_use]
    pub fn with_clock(store: Arc<S>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            default_ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    /// Look up the learning, fail `NotFound` if absent, else atomically
    /// increment `trigger_count` and set `last_triggered`.
    pub async fn record_trigger(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        self.store.increment_trigger_count(id, now).await?;
        debug!(id, "recorded trigger");
        Ok(())
    }

    /// Delete every learning whose staleness predicate holds at a single
    /// evaluated instant, returning the count removed.
    pub async fn cleanup_stale(&self) -> Result<u64> {
        let now = self.clock.now();
        let all = self.store.all().await?;
        let stale_ids: Vec<String> = all
            .into_iter()
            .filter(|l| self.is_stale(l, now))
            .map(|l| l.id)
            .collect();

        if stale_ids.is_empty() {
            return Ok(0);
        }

        let removed = self.store.delete_many(&stale_ids).await?;
        info!(removed, "cleaned up stale learnings");
        Ok(removed)
    }

    /// `{total, active, stale, by_outcome_type}`, with `active + stale == total`.
    pub async fn health_stats(&self) -> Result<HealthStats> {
        let now = self.clock.now();
        let all = self.store.all().await?;

        let mut stats = HealthStats {
            total: all.len(),
            active: 0,
            stale: 0,
            by_outcome_type: HashMap::new(),
        };

        for learning in &all {
            if self.is_stale(learning, now) {
                stats.stale += 1;
            } else {
                stats.active += 1;
            }
            *stats.by_outcome_type.entry(learning.outcome_type).or_insert(0) += 1;
        }

        Ok(stats)
    }

    fn is_stale(&self, learning: &crate::types::Learning, now: chrono::DateTime<chrono::Utc>) -> bool {
        let reference = learning.last_triggered.unwrap_or(learning.created_at);
        let effective_ttl = if learning.ttl.as_secs() > 0 {
            ChronoDuration::from_std(learning.ttl).unwrap_or_else(|_| ChronoDuration::days(self.default_ttl_days))
        } else {
            ChronoDuration::days(self.default_ttl_days)
        };
        reference + effective_ttl < now
    }
}
