//! Run outcomes and state-machine phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal state of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Judge approved a draft
    Approved,
    /// Appropriateness rejection, never retried
    Rejected,
    /// Attempt budget spent without approval
    Exhausted,
    /// Fatal failure; the event is unresolved
    Errored,
}

impl RunOutcome {
    pub fn final_status(&self) -> FinalStatus {
        match self {
            RunOutcome::Approved => FinalStatus::Approved,
            RunOutcome::Rejected | RunOutcome::Exhausted => FinalStatus::Rejected,
            RunOutcome::Errored => FinalStatus::Errored,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Approved => "approved",
            RunOutcome::Rejected => "rejected",
            RunOutcome::Exhausted => "exhausted",
            RunOutcome::Errored => "errored",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business-facing status. Exhausted runs report as rejected; errored stays distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalStatus {
    Approved,
    Rejected,
    Errored,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Approved => write!(f, "approved"),
            FinalStatus::Rejected => write!(f, "rejected"),
            FinalStatus::Errored => write!(f, "errored"),
        }
    }
}

/// One state visited by the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Generating { attempt: u32 },
    Judging { attempt: u32 },
    Deciding { attempt: u32 },
    Retry { attempt: u32 },
    Terminal { outcome: RunOutcome },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "INIT"),
            RunPhase::Generating { attempt } => write!(f, "GENERATING({})", attempt),
            RunPhase::Judging { attempt } => write!(f, "JUDGING({})", attempt),
            RunPhase::Deciding { attempt } => write!(f, "DECIDING({})", attempt),
            RunPhase::Retry { attempt } => write!(f, "RETRY({})", attempt),
            RunPhase::Terminal { outcome } => write!(f, "TERMINAL({})", outcome),
        }
    }
}
