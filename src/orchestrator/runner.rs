//! The orchestration loop.
//!
//! `INIT -> GENERATING -> JUDGING -> DECIDING -> (RETRY -> GENERATING) | TERMINAL`
//!
//! Policy lives in [`RetryPolicy`]; model access lives behind the generator
//! and judge traits. The loop itself holds no randomness, so identical
//! generator/judge outputs always yield an identical record.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::policy::{Decision, RetryPolicy};
use super::state::{RunMeta, RunState};
use crate::domain::{ConfigSource, CustomerEvent, DecisionRecord, FeatureContext, PriorFeedback, RunOutcome, RunPhase};
use crate::error::{ModelStage, Result, UpsellError};
use crate::generator::MessageGenerator;
use crate::guidelines::{BrandRules, ServiceCatalog};
use crate::judge::MessageJudge;
use crate::llm::TransportRetry;
use crate::resolver::{AgentResolver, FeatureResolver};
use crate::storage::DecisionStore;

pub const DEFAULT_AGENT_ID: &str = "upsell-generator";

/// Drives one event at a time through generate/judge/decide.
///
/// Holds only shared read-only collaborators, so one instance can serve many
/// concurrent runs.
pub struct Orchestrator {
    features: Arc<dyn FeatureResolver>,
    agents: Arc<dyn AgentResolver>,
    generator: Arc<dyn MessageGenerator>,
    judge: Arc<dyn MessageJudge>,
    catalog: Arc<ServiceCatalog>,
    brand: Arc<BrandRules>,
    store: Option<Arc<dyn DecisionStore>>,
    policy: RetryPolicy,
    transport: TransportRetry,
    agent_id: String,
}

impl Orchestrator {
    pub fn new(
        features: Arc<dyn FeatureResolver>,
        agents: Arc<dyn AgentResolver>,
        generator: Arc<dyn MessageGenerator>,
        judge: Arc<dyn MessageJudge>,
    ) -> Self {
        Self {
            features,
            agents,
            generator,
            judge,
            catalog: Arc::new(ServiceCatalog::builtin()),
            brand: Arc::new(BrandRules::default()),
            store: None,
            policy: RetryPolicy::default(),
            transport: TransportRetry::default(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<ServiceCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_brand(mut self, brand: Arc<BrandRules>) -> Self {
        self.brand = brand;
        self
    }

    /// Sink for `process`; `run` never writes.
    pub fn with_store(mut self, store: Arc<dyn DecisionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_transport(mut self, transport: TransportRetry) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one event to a terminal state and return its record.
    ///
    /// Malformed events are refused with `InvalidEvent` before the loop
    /// starts. Every other failure ends in an `errored` record.
    pub async fn run(&self, event: &CustomerEvent) -> Result<DecisionRecord> {
        self.replay(RunMeta::fresh(), event).await
    }

    /// Same as `run` with a caller-chosen id and timestamp.
    pub async fn replay(&self, meta: RunMeta, event: &CustomerEvent) -> Result<DecisionRecord> {
        event.validate()?;

        let mut state = RunState::new(meta, event);
        log::info!("Run {} started for customer {}", state.id(), state.customer_key());

        let record = match self.drive(&mut state, event).await {
            Ok(outcome) => state.finish(outcome, None),
            Err(e) => {
                log::error!("Run {} errored: {}", state.id(), e);
                state.finish(RunOutcome::Errored, Some(&e))
            }
        };

        log::info!(
            "Run {} finished: {} after {} attempt(s)",
            record.id,
            record.outcome,
            record.attempt_count
        );
        Ok(record)
    }

    /// Run and persist to the configured store.
    pub async fn process(&self, event: &CustomerEvent) -> Result<DecisionRecord> {
        let record = self.run(event).await?;
        if let Some(store) = &self.store {
            store.append(&record)?;
        }
        Ok(record)
    }

    /// `process`, abandoned when `token` fires. A cancelled run leaves no record.
    pub async fn run_with_cancel(&self, event: &CustomerEvent, token: CancellationToken) -> Result<DecisionRecord> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::info!("Run for customer {} cancelled", event.customer_key().unwrap_or_default());
                Err(UpsellError::Cancelled)
            }
            result = self.process(event) => result,
        }
    }

    /// `process` with a deadline. A timed-out run leaves no record.
    pub async fn run_with_timeout(&self, event: &CustomerEvent, timeout: Duration) -> Result<DecisionRecord> {
        match tokio::time::timeout(timeout, self.process(event)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Run for customer {} timed out after {:?}",
                    event.customer_key().unwrap_or_default(),
                    timeout
                );
                Err(UpsellError::TimedOut(timeout))
            }
        }
    }

    async fn resolve_features(&self, customer_key: &str) -> Option<FeatureContext> {
        match self.features.lookup(customer_key).await {
            Ok(found) => {
                if found.is_none() {
                    log::debug!("No feature context for customer {}", customer_key);
                }
                found
            }
            Err(e) => {
                log::warn!("Feature lookup failed for customer {}, continuing without: {}", customer_key, e);
                None
            }
        }
    }

    async fn drive(&self, state: &mut RunState, event: &CustomerEvent) -> Result<RunOutcome> {
        state.transition(RunPhase::Init);

        let features = self.resolve_features(state.customer_key()).await;
        state.set_features_available(features.is_some());
        let features = features.as_ref();

        let resolved = self.agents.get_active(&self.agent_id).await?;
        if !resolved.config.is_live() {
            return Err(UpsellError::ConfigUnavailable(format!(
                "agent '{}' version {} is {}, not production",
                resolved.config.agent_id, resolved.config.version, resolved.config.status
            )));
        }
        if resolved.source == ConfigSource::Fallback {
            log::warn!(
                "Run {} is using the fallback configuration for agent '{}': no production version is promoted",
                state.id(),
                self.agent_id
            );
        }
        let agent = resolved.config.clone();
        state.set_agent(resolved);

        let generator = &self.generator;
        let judge = &self.judge;
        let catalog = self.catalog.as_ref();
        let brand = self.brand.as_ref();

        let mut prior: Option<PriorFeedback> = None;
        let mut attempt = 1;
        loop {
            state.transition(RunPhase::Generating { attempt });
            let agent_ref = &agent;
            let prior_ref = prior.as_ref();
            let mut draft = self
                .transport
                .run(ModelStage::Generator, move || {
                    generator.generate(event, features, agent_ref, prior_ref, attempt)
                })
                .await?;
            draft.attempt = attempt;
            state.set_draft(draft.clone());

            state.transition(RunPhase::Judging { attempt });
            let draft_ref = &draft;
            let verdict = self
                .transport
                .run(ModelStage::Judge, move || {
                    judge.evaluate(draft_ref, event, features, catalog, brand)
                })
                .await?;
            verdict.validate()?;

            if verdict.approved {
                log::info!("Run {} attempt {} approved (score {})", state.id(), attempt, verdict.score);
            } else {
                log::warn!(
                    "Run {} attempt {} rejected for {} (score {}): {}",
                    state.id(),
                    attempt,
                    verdict.category_label(),
                    verdict.score,
                    verdict.feedback
                );
            }

            let decision = self.policy.decide(attempt, &verdict);
            state.record(draft, verdict);
            state.transition(RunPhase::Deciding { attempt });

            match decision? {
                Decision::Accept => return Ok(RunOutcome::Approved),
                Decision::Reject => return Ok(RunOutcome::Rejected),
                Decision::Exhaust => return Ok(RunOutcome::Exhausted),
                Decision::Retry(feedback) => {
                    state.transition(RunPhase::Retry { attempt });
                    prior = Some(feedback);
                    attempt += 1;
                }
            }
        }
    }
}
