//! Model access: the `LlmClient` seam, the Anthropic Messages API client,
//! and transport-level retry.

pub mod anthropic;
pub mod client;
pub mod retry;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use retry::TransportRetry;
pub use types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};

/// Strip a surrounding markdown code fence, if any.
///
/// Models often wrap JSON in ```json ... ``` even when told not to.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
