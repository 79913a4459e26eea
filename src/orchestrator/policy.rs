//! Retry policy applied in the DECIDING state.

use serde::{Deserialize, Serialize};

use crate::domain::{PriorFeedback, RejectionCategory, Verdict};
use crate::error::Result;

/// What the loop does after a verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Approved; this attempt's draft wins
    Accept,
    /// Rejected for a reason regeneration cannot fix
    Reject,
    /// Budget spent without approval
    Exhaust,
    /// Regenerate with this feedback
    Retry(PriorFeedback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// A zero budget is raised to one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Decide the next step for `attempt` (1-based) given its verdict.
    ///
    /// Rules apply in order: approval, appropriateness, budget, retry.
    pub fn decide(&self, attempt: u32, verdict: &Verdict) -> Result<Decision> {
        verdict.validate()?;

        let Some(category) = verdict.rejection_category else {
            return Ok(Decision::Accept);
        };

        match category {
            RejectionCategory::Appropriateness => Ok(Decision::Reject),
            RejectionCategory::ServiceValidity | RejectionCategory::Brand => {
                if attempt >= self.max_attempts {
                    Ok(Decision::Exhaust)
                } else {
                    Ok(Decision::Retry(PriorFeedback {
                        attempt,
                        category,
                        feedback: verdict.feedback.clone(),
                        issues: verdict.issues.clone(),
                    }))
                }
            }
        }
    }
}
