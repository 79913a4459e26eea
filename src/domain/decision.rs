//! Attempt and decision records: the audit trail of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::ConfigSource;
use super::draft::Draft;
use super::outcome::{FinalStatus, RunOutcome, RunPhase};
use super::verdict::{RejectionCategory, Verdict};
use crate::error::{ErrorKind, UpsellError};

/// A draft paired with its verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub draft: Draft,
    pub verdict: Verdict,
}

/// Error captured on an errored run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&UpsellError> for ErrorDetail {
    fn from(err: &UpsellError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Terminal, immutable output of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub customer_key: String,
    pub outcome: RunOutcome,
    pub final_status: FinalStatus,
    /// Winning draft when approved, otherwise the last one produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
    pub attempts: Vec<AttemptRecord>,
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_source: Option<ConfigSource>,
    pub feature_context_available: bool,
    /// Last verdict's feedback for rejected and exhausted runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_category: Option<RejectionCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub transitions: Vec<RunPhase>,
}

impl DecisionRecord {
    /// Only approved runs may send anything downstream.
    pub fn is_sendable(&self) -> bool {
        self.outcome == RunOutcome::Approved
    }

    /// Errored runs are unresolved events and need operational follow-up.
    pub fn needs_followup(&self) -> bool {
        self.outcome == RunOutcome::Errored
    }

    pub fn used_fallback_config(&self) -> bool {
        self.config_source == Some(ConfigSource::Fallback)
    }

    /// Last attempt's verdict, if any attempt completed.
    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.attempts.last().map(|a| &a.verdict)
    }

    /// Attempts are numbered 1..=n with no gaps and count matches.
    pub fn is_well_formed(&self) -> bool {
        self.attempt_count as usize == self.attempts.len()
            && self
                .attempts
                .iter()
                .enumerate()
                .all(|(i, a)| a.attempt == i as u32 + 1 && a.draft.attempt == a.attempt)
    }
}
