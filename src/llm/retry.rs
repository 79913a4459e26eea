//! Transport-level retry with exponential backoff.
//!
//! A model call that fails transiently (timeout, rate limit, 5xx) is retried
//! here, inside a single stage invocation. These retries never count against
//! the judge-driven attempt budget and are never visible as attempts in the
//! decision record.

use std::future::Future;
use std::time::Duration;

use crate::error::{ModelStage, Result};

/// Backoff configuration for transport retries.
#[derive(Debug, Clone)]
pub struct TransportRetry {
    /// Retries after the first call (2 means at most 3 calls).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl TransportRetry {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// `initial * 2^retry`, capped at `max_backoff`. A server-provided
    /// `retry_after` wins when it is longer.
    pub fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        let exp = self.initial_backoff.saturating_mul(factor).min(self.max_backoff);
        match retry_after {
            Some(hint) => hint.max(exp),
            None => exp,
        }
    }

    /// Run `op`, retrying transient failures up to `max_retries` times.
    ///
    /// Non-transient errors and the last transient error are returned as-is.
    pub async fn run<T, F, Fut>(&self, stage: ModelStage, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    let delay = self.backoff(retries, e.retry_after());
                    tracing::warn!(
                        stage = %stage,
                        retry = retries + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient model failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
