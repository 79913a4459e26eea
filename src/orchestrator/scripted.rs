//! Scripted generator and judge for exercising the loop without a model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{AgentConfig, CustomerEvent, Draft, FeatureContext, PriorFeedback, Verdict};
use crate::error::{ModelStage, Result, UpsellError};
use crate::generator::MessageGenerator;
use crate::guidelines::{BrandRules, ServiceCatalog};
use crate::judge::MessageJudge;

/// What the scripted generator saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub attempt: u32,
    pub prior: Option<PriorFeedback>,
    pub had_features: bool,
    pub agent_version: String,
}

/// Returns queued results in order; once the queue is empty it keeps
/// producing numbered drafts.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Draft>>>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<Draft>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, result: Result<Draft>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _event: &CustomerEvent,
        features: Option<&FeatureContext>,
        agent: &AgentConfig,
        prior: Option<&PriorFeedback>,
        attempt: u32,
    ) -> Result<Draft> {
        self.calls
            .lock()
            .map_err(|e| UpsellError::Storage(e.to_string()))?
            .push(GenerateCall {
                attempt,
                prior: prior.cloned(),
                had_features: features.is_some(),
                agent_version: agent.version.clone(),
            });

        let next = self
            .script
            .lock()
            .map_err(|e| UpsellError::Storage(e.to_string()))?
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(Draft::new(attempt, format!("Subject {}", attempt), format!("Body {}", attempt)).with_confidence(0.8))
        })
    }
}

/// Returns queued verdicts in order. An empty queue is a fatal judge failure.
#[derive(Debug, Default)]
pub struct ScriptedJudge {
    script: Mutex<VecDeque<Result<Verdict>>>,
    seen: Mutex<Vec<Draft>>,
}

impl ScriptedJudge {
    pub fn with_verdicts(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self::with_results(verdicts.into_iter().map(Ok))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<Verdict>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Drafts evaluated so far.
    pub fn seen(&self) -> Vec<Draft> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageJudge for ScriptedJudge {
    async fn evaluate(
        &self,
        draft: &Draft,
        _event: &CustomerEvent,
        _features: Option<&FeatureContext>,
        _catalog: &ServiceCatalog,
        _brand: &BrandRules,
    ) -> Result<Verdict> {
        self.seen
            .lock()
            .map_err(|e| UpsellError::Storage(e.to_string()))?
            .push(draft.clone());

        let next = self
            .script
            .lock()
            .map_err(|e| UpsellError::Storage(e.to_string()))?
            .pop_front();
        next.unwrap_or_else(|| {
            Err(UpsellError::FatalModelFailure {
                stage: ModelStage::Judge,
                message: "judge script exhausted".to_string(),
            })
        })
    }
}
