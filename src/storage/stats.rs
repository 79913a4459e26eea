//! Aggregates over stored decisions.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{DecisionRecord, RejectionCategory, RunOutcome};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionStats {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub exhausted: usize,
    pub errored: usize,
    /// Approved over non-errored runs
    pub approval_rate: f64,
    pub average_attempts: f64,
    /// Runs approved after at least one retry
    pub approved_after_retry: usize,
    /// Terminal rejection category counts (rejected and exhausted runs)
    pub by_category: BTreeMap<RejectionCategory, usize>,
    pub fallback_config_runs: usize,
}

impl DecisionStats {
    pub fn from_records(records: &[DecisionRecord]) -> Self {
        let mut stats = DecisionStats {
            total: records.len(),
            ..Default::default()
        };
        let mut attempts = 0u64;

        for record in records {
            match record.outcome {
                RunOutcome::Approved => {
                    stats.approved += 1;
                    if record.attempt_count > 1 {
                        stats.approved_after_retry += 1;
                    }
                }
                RunOutcome::Rejected => stats.rejected += 1,
                RunOutcome::Exhausted => stats.exhausted += 1,
                RunOutcome::Errored => stats.errored += 1,
            }
            if let Some(category) = record.rejection_category {
                *stats.by_category.entry(category).or_default() += 1;
            }
            if record.used_fallback_config() {
                stats.fallback_config_runs += 1;
            }
            attempts += record.attempt_count as u64;
        }

        let decided = stats.total - stats.errored;
        if decided > 0 {
            stats.approval_rate = stats.approved as f64 / decided as f64;
        }
        if stats.total > 0 {
            stats.average_attempts = attempts as f64 / stats.total as f64;
        }
        stats
    }

    /// Errored runs are unresolved events, not business decisions.
    pub fn needs_followup(&self) -> usize {
        self.errored
    }
}
