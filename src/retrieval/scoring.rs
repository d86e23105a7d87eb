//! Composite ranking: BM25 blended with trigger-count dampening, recency,
//! and an effectiveness floor, in the style of the reference codebase's
//! `RankingWeights`.

use chrono::{DateTime, Utc};

use crate::types::Learning;

use super::bm25::Bm25Params;

/// Every tunable constant of the composite ranking formula, collected so
/// callers can override defaults without touching the retriever itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub bm25: Bm25Params,
    /// Half-life, in days, of the recency decay applied to `last_triggered`.
    pub recency_half_life_days: f64,
    /// Floor applied to `effectiveness` so a struggling learning can recover.
    pub effectiveness_floor: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            recency_half_life_days: 7.0,
            effectiveness_floor: 0.1,
        }
    }
}

/// `1` if never triggered, else `1 / (1 + days_since / half_life)`.
#[must_use]
pub fn recency_score(learning: &Learning, now: DateTime<Utc>, weights: &RankingWeights) -> f64 {
    match learning.last_triggered {
        None => 1.0,
        Some(last) => {
            let days_since = (now - last).num_seconds() as f64 / 86_400.0;
            let days_since = days_since.max(0.0);
            1.0 / (1.0 + days_since / weights.recency_half_life_days)
        }
    }
}

/// `max(floor, effectiveness)`.
#[must_use]
pub fn effectiveness_score(learning: &Learning, weights: &RankingWeights) -> f64 {
    learning.effectiveness.max(weights.effectiveness_floor)
}

/// `sqrt(1 + trigger_count)`.
#[must_use]
pub fn trigger_dampening(learning: &Learning) -> f64 {
    (1.0 + learning.trigger_count as f64).sqrt()
}

/// `(1 + bm25) * sqrt(1 + trigger_count) * recency * effectiveness`.
#[must_use]
pub fn composite_score(learning: &Learning, bm25: f64, now: DateTime<Utc>, weights: &RankingWeights) -> f64 {
    (1.0 + bm25) * trigger_dampening(learning) * recency_score(learning, now, weights) * effectiveness_score(learning, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutcomeType, Scope};

    fn sample() -> Learning {
        Learning {
            id: "l".into(),
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

    #[test]
    fn never_triggered_has_full_recency() {
        let l = sample();
        assert_eq!(recency_score(&l, Utc::now(), &RankingWeights::default()), 1.0);
    }

    #[test]
    fn recency_decays_with_age() {
        let mut l = sample();
        let now = Utc::now();
        l.last_triggered = Some(now - chrono::Duration::days(7));
        let score = recency_score(&l, now, &RankingWeights::default());
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn effectiveness_floor_prevents_zero() {
        let mut l = sample();
        l.effectiveness = 0.0;
        assert_eq!(effectiveness_score(&l, &RankingWeights::default()), 0.1);
    }

    #[test]
    fn trigger_dampening_grows_with_sqrt() {
        let mut l = sample();
        l.trigger_count = 3;
        assert!((trigger_dampening(&l) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn higher_trigger_count_outranks_lower_under_equal_bm25() {
        let mut frequent = sample();
        frequent.id = "frequent".into();
        frequent.trigger_count = 10;
        let mut rare = sample();
        rare.id = "rare".into();
        rare.trigger_count = 0;

        let now = Utc::now();
        let weights = RankingWeights::default();
        assert!(
            composite_score(&frequent, 0.0, now, &weights) > composite_score(&rare, 0.0, now, &weights)
        );
    }
}
