//! Error types for Upsellr
//!
//! Centralized error handling using thiserror.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// Which model-backed stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStage {
    Generator,
    Judge,
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStage::Generator => write!(f, "generator"),
            ModelStage::Judge => write!(f, "judge"),
        }
    }
}

/// All error types that can occur in Upsellr
#[derive(Debug, Error)]
pub enum UpsellError {
    /// No usable agent configuration, not even the fallback default
    #[error("Agent configuration unavailable: {0}")]
    ConfigUnavailable(String),

    /// Generator call failed transiently (timeout, rate limit, 5xx)
    #[error("Generation unavailable: {message}")]
    GenerationUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Judge call failed transiently
    #[error("Judge unavailable: {message}")]
    JudgeUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Model call failed in a way retrying cannot fix
    #[error("Fatal {stage} failure: {message}")]
    FatalModelFailure { stage: ModelStage, message: String },

    /// Judge response could not be interpreted as a verdict
    #[error("Invalid judge output: {0}")]
    InvalidJudgeOutput(String),

    /// Inbound event failed validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Agent registration or promotion failed
    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    /// Prompt template could not be registered or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Decision record not found in storage
    #[error("Decision not found: {0}")]
    DecisionNotFound(String),

    /// Run was cancelled externally
    #[error("Run cancelled")]
    Cancelled,

    /// Run exceeded its deadline
    #[error("Run timed out after {0:?}")]
    TimedOut(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error classification stamped into errored decision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigUnavailable,
    TransientModelFailure,
    FatalModelFailure,
    InvalidJudgeOutput,
    Internal,
}

impl UpsellError {
    /// Map a transport error from the given stage onto the run taxonomy.
    pub fn from_llm(stage: ModelStage, err: LlmError) -> Self {
        if err.is_retryable() {
            let retry_after = err.retry_after();
            let message = err.to_string();
            match stage {
                ModelStage::Generator => UpsellError::GenerationUnavailable { message, retry_after },
                ModelStage::Judge => UpsellError::JudgeUnavailable { message, retry_after },
            }
        } else {
            UpsellError::FatalModelFailure {
                stage,
                message: err.to_string(),
            }
        }
    }

    /// Transient failures are retried at the transport level, never by the judge loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpsellError::GenerationUnavailable { .. } | UpsellError::JudgeUnavailable { .. }
        )
    }

    /// Failures that abort a run as `errored`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UpsellError::ConfigUnavailable(_)
                | UpsellError::FatalModelFailure { .. }
                | UpsellError::InvalidJudgeOutput(_)
        )
    }

    /// Server-suggested delay carried by a transient failure.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UpsellError::GenerationUnavailable { retry_after, .. }
            | UpsellError::JudgeUnavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpsellError::ConfigUnavailable(_) => ErrorKind::ConfigUnavailable,
            UpsellError::GenerationUnavailable { .. } | UpsellError::JudgeUnavailable { .. } => {
                ErrorKind::TransientModelFailure
            }
            UpsellError::FatalModelFailure { .. } => ErrorKind::FatalModelFailure,
            UpsellError::InvalidJudgeOutput(_) => ErrorKind::InvalidJudgeOutput,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias for Upsellr operations
pub type Result<T> = std::result::Result<T, UpsellError>;
