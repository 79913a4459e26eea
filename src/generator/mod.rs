//! Message generation.
//!
//! The generator is stateless: every call builds a fresh prompt from the
//! event, features, agent configuration, and any feedback from the previous
//! attempt, then makes one model call.

mod llm;
mod subject;

use async_trait::async_trait;

pub use llm::{GenerationContext, LlmGenerator, RETRY_TEMPERATURE_STEP, category_guidance, parse_draft};
pub use subject::fallback_subject;

use crate::domain::{AgentConfig, CustomerEvent, Draft, FeatureContext, PriorFeedback};
use crate::error::Result;

/// Produces one draft per call.
///
/// Transient model failures surface as `GenerationUnavailable`; anything
/// retrying cannot fix surfaces as `FatalModelFailure`.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(
        &self,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        agent: &AgentConfig,
        prior: Option<&PriorFeedback>,
        attempt: u32,
    ) -> Result<Draft>;
}
