//! Core data types: learnings, concepts, and task outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "proptest-arbitrary")]
use proptest::prelude::{prop_oneof, Arbitrary, BoxedStrategy, Just, Strategy};

use crate::error::{Error, Result};

/// Applicability tag of a [`Learning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Applies only to the current repository.
    Repo,
    /// Applies to a subset of the current project.
    Module,
    /// Applies across projects.
    Global,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Repo => write!(f, "repo"),
            Scope::Module => write!(f, "module"),
            Scope::Global => write!(f, "global"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "repo" => Ok(Scope::Repo),
            "module" => Ok(Scope::Module),
            "global" => Ok(Scope::Global),
            other => Err(Error::InvalidInput(format!("unknown scope: {other}"))),
        }
    }
}

/// Outcome classification recorded on the [`Learning`] itself at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Success,
    Failure,
    Neutral,
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeType::Success => write!(f, "success"),
            OutcomeType::Failure => write!(f, "failure"),
            OutcomeType::Neutral => write!(f, "neutral"),
        }
    }
}

impl std::str::FromStr for OutcomeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(OutcomeType::Success),
            "failure" => Ok(OutcomeType::Failure),
            "neutral" => Ok(OutcomeType::Neutral),
            other => Err(Error::InvalidInput(format!("unknown outcome_type: {other}"))),
        }
    }
}

#[cfg(feature = "proptest-arbitrary")]
impl Arbitrary for OutcomeType {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Self::Success),
            Just(Self::Failure),
            Just(Self::Neutral),
        ]
        .boxed()
    }
}

/// Final outcome of a completed task, as reported to [`crate::effectiveness::EffectivenessTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcomeKind {
    Success,
    Failure,
    Blocked,
}

impl std::fmt::Display for TaskOutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcomeKind::Success => write!(f, "success"),
            TaskOutcomeKind::Failure => write!(f, "failure"),
            TaskOutcomeKind::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for TaskOutcomeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(TaskOutcomeKind::Success),
            "failure" => Ok(TaskOutcomeKind::Failure),
            "blocked" => Ok(TaskOutcomeKind::Blocked),
            other => Err(Error::InvalidInput(format!("unknown task outcome: {other}"))),
        }
    }
}

#[cfg(feature = "proptest-arbitrary")]
impl Arbitrary for TaskOutcomeKind {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Self::Success),
            Just(Self::Failure),
            Just(Self::Blocked),
        ]
        .boxed()
    }
}

/// Tri-state verification result attached to a [`TaskOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pass,
    Fail,
    NotRun,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pass => write!(f, "pass"),
            VerificationStatus::Fail => write!(f, "fail"),
            VerificationStatus::NotRun => write!(f, "not_run"),
        }
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pass" => Ok(VerificationStatus::Pass),
            "fail" => Ok(VerificationStatus::Fail),
            "not_run" => Ok(VerificationStatus::NotRun),
            other => Err(Error::InvalidInput(format!("unknown verification status: {other}"))),
        }
    }
}

/// A single captured Condition → Action → Outcome triple, with usage and
/// effectiveness tracking.
///
/// # Invariants
///
/// * `condition`, `action`, and `outcome` are non-empty after trimming.
/// * `trigger_count >= 0`.
/// * `effectiveness == success_count / (success_count + failure_count)` whenever
///   the denominator is non-zero; `1.0` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub condition: String,
    pub action: String,
    pub outcome: String,
    pub commit_hash: Option<String>,
    pub log_snippet_id: Option<String>,
    pub scope: Scope,
    /// `0` means "use the lifecycle manager's configured default".
    pub ttl: Duration,
    pub last_triggered: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub outcome_type: OutcomeType,
    pub created_at: DateTime<Utc>,
    pub success_count: u64,
    pub failure_count: u64,
    pub effectiveness: f64,
}

impl Learning {
    /// Total number of recorded task outcomes that used this learning.
    #[must_use]
    pub fn uses(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Recompute `effectiveness` from `success_count`/`failure_count`, per the
    /// monotonic formula: `success / (success + failure)`, or `1.0` when no
    /// outcomes have been recorded yet.
    pub fn recompute_effectiveness(&mut self) {
        let uses = self.uses();
        self.effectiveness = if uses == 0 {
            1.0
        } else {
            self.success_count as f64 / uses as f64
        };
    }

    /// The concatenated text the store indexes for lexical search.
    #[must_use]
    pub fn indexed_text(&self) -> String {
        format!("{} {} {}", self.condition, self.action, self.outcome)
    }
}

/// A named tag used to group related [`Learning`] records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Record of a completed task, used by the effectiveness tracker to update
/// the learnings that were applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub session_id: Option<String>,
    pub outcome: TaskOutcomeKind,
    pub verification_passed: VerificationStatus,
    pub learnings_used: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskOutcome {
    /// Whether this outcome counts as a success for effectiveness purposes:
    /// the task succeeded *and* verification passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcomeKind::Success
            && self.verification_passed == VerificationStatus::Pass
    }
}

/// A validated Condition/Action/Outcome triple, prior to being given an id and
/// defaults by the facade. Produced by [`crate::parser::parse_cao`] or by a
/// confirmed [`crate::capture::SuggestedLearning`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaoTriple {
    pub condition: String,
    pub action: String,
    pub outcome: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effectiveness_defaults_to_one_with_no_uses() {
        let mut l = sample_learning();
        l.success_count = 0;
        l.failure_count = 0;
        l.recompute_effectiveness();
        assert_eq!(l.effectiveness, 1.0);
    }

    #[test]
    fn effectiveness_is_ratio_once_used() {
        let mut l = sample_learning();
        l.success_count = 3;
        l.failure_count = 1;
        l.recompute_effectiveness();
        assert_eq!(l.effectiveness, 0.75);
    }

    fn sample_learning() -> Learning {
        Learning {
            id: "learn-001".into(),
            condition: "When tests fail".into(),
            action: "Increase timeout".into(),
            outcome: "Tests pass".into(),
            commit_hash: None,
            log_snippet_id: None,
            scope: Scope::Repo,
            ttl: Duration::from_secs(0),
            last_triggered: None,
            trigger_count: 0,
            outcome_type: OutcomeType::Neutral,
            created_at: Utc::now(),
            success_count: 0,
            failure_count: 0,
            effectiveness: 1.0,
        }
    }
}
