//! Judge verdicts and the rejection taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpsellError};

/// Highest quality score a judge may award.
pub const MAX_SCORE: u8 = 10;

/// Why a draft was not approved. Closed set, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCategory {
    /// Wrong moment to contact the customer
    Appropriateness,
    /// Recommended service is unknown or already owned
    ServiceValidity,
    /// Tone, voice, or factual quality
    Brand,
}

impl RejectionCategory {
    /// Evaluation order; the first failing criterion wins.
    pub const ALL: [RejectionCategory; 3] = [
        RejectionCategory::Appropriateness,
        RejectionCategory::ServiceValidity,
        RejectionCategory::Brand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCategory::Appropriateness => "appropriateness",
            RejectionCategory::ServiceValidity => "service_validity",
            RejectionCategory::Brand => "brand",
        }
    }
}

impl fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RejectionCategory {
    type Err = UpsellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "appropriateness" => Ok(RejectionCategory::Appropriateness),
            "service_validity" => Ok(RejectionCategory::ServiceValidity),
            "brand" => Ok(RejectionCategory::Brand),
            other => Err(UpsellError::InvalidJudgeOutput(format!(
                "unknown rejection category '{}'",
                other
            ))),
        }
    }
}

/// Structured evaluation of one draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub approved: bool,
    /// Quality score on 0..=10; reported for monitoring, never gates approval
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_category: Option<RejectionCategory>,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl Verdict {
    pub fn approve(score: u8, feedback: impl Into<String>) -> Self {
        Self {
            approved: true,
            score: score.min(MAX_SCORE),
            rejection_category: None,
            feedback: feedback.into(),
            issues: Vec::new(),
        }
    }

    pub fn reject(category: RejectionCategory, score: u8, feedback: impl Into<String>) -> Self {
        Self {
            approved: false,
            score: score.min(MAX_SCORE),
            rejection_category: Some(category),
            feedback: feedback.into(),
            issues: Vec::new(),
        }
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    /// Approval and category must agree, and the score must be on scale.
    pub fn validate(&self) -> Result<()> {
        if self.score > MAX_SCORE {
            return Err(UpsellError::InvalidJudgeOutput(format!(
                "score {} exceeds {}",
                self.score, MAX_SCORE
            )));
        }
        match (self.approved, self.rejection_category) {
            (true, None) | (false, Some(_)) => Ok(()),
            (true, Some(category)) => Err(UpsellError::InvalidJudgeOutput(format!(
                "approved verdict carries rejection category '{}'",
                category
            ))),
            (false, None) => Err(UpsellError::InvalidJudgeOutput(
                "rejected verdict has no rejection category".to_string(),
            )),
        }
    }

    /// Category label for display; "N/A" when approved.
    pub fn category_label(&self) -> &'static str {
        self.rejection_category.map(|c| c.as_str()).unwrap_or("N/A")
    }
}

/// Corrective context handed to the generator on a retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorFeedback {
    /// Attempt whose verdict produced this feedback
    pub attempt: u32,
    pub category: RejectionCategory,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl PriorFeedback {
    /// Feedback from a rejected verdict; `None` when the verdict was approved.
    pub fn from_verdict(attempt: u32, verdict: &Verdict) -> Option<Self> {
        verdict.rejection_category.map(|category| Self {
            attempt,
            category,
            feedback: verdict.feedback.clone(),
            issues: verdict.issues.clone(),
        })
    }
}
