//! Per-run accumulator that becomes the decision record.

use chrono::{DateTime, Utc};

use crate::domain::{
    AttemptRecord, CustomerEvent, DecisionRecord, Draft, ErrorDetail, ResolvedAgent, RunOutcome, RunPhase, Verdict,
};
use crate::error::UpsellError;
use crate::id::generate_decision_id;

/// Identity of one run. Fixing it makes a replay reproduce the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl RunMeta {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }

    pub fn fresh() -> Self {
        Self::new(generate_decision_id(), Utc::now())
    }
}

#[derive(Debug)]
pub(crate) struct RunState {
    meta: RunMeta,
    event_id: Option<String>,
    customer_key: String,
    agent: Option<ResolvedAgent>,
    feature_context_available: bool,
    last_draft: Option<Draft>,
    attempts: Vec<AttemptRecord>,
    transitions: Vec<RunPhase>,
}

impl RunState {
    pub(crate) fn new(meta: RunMeta, event: &CustomerEvent) -> Self {
        Self {
            meta,
            event_id: event.event_id.clone(),
            customer_key: event.customer_key().unwrap_or_default().to_string(),
            agent: None,
            feature_context_available: false,
            last_draft: None,
            attempts: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.meta.id
    }

    pub(crate) fn customer_key(&self) -> &str {
        &self.customer_key
    }

    pub(crate) fn transition(&mut self, phase: RunPhase) {
        log::debug!("Run {}: {}", self.meta.id, phase);
        self.transitions.push(phase);
    }

    pub(crate) fn set_features_available(&mut self, available: bool) {
        self.feature_context_available = available;
    }

    pub(crate) fn set_agent(&mut self, agent: ResolvedAgent) {
        self.agent = Some(agent);
    }

    pub(crate) fn set_draft(&mut self, draft: Draft) {
        self.last_draft = Some(draft);
    }

    /// Append a judged attempt. Index is always `attempts.len() + 1`.
    pub(crate) fn record(&mut self, draft: Draft, verdict: Verdict) {
        let attempt = self.attempts.len() as u32 + 1;
        self.last_draft = Some(draft.clone());
        self.attempts.push(AttemptRecord {
            attempt,
            draft,
            verdict,
        });
    }

    /// Close the run. `error` is only set for errored runs.
    pub(crate) fn finish(mut self, outcome: RunOutcome, error: Option<&UpsellError>) -> DecisionRecord {
        self.transition(RunPhase::Terminal { outcome });

        let last_verdict = self.attempts.last().map(|a| &a.verdict);
        let (reason, rejection_category) = match (outcome, last_verdict) {
            (RunOutcome::Rejected | RunOutcome::Exhausted, Some(v)) => (Some(v.feedback.clone()), v.rejection_category),
            (RunOutcome::Errored, _) => (error.map(|e| e.to_string()), None),
            _ => (None, None),
        };

        let (agent_id, agent_version, config_source) = match &self.agent {
            Some(agent) => (
                Some(agent.config.agent_id.clone()),
                Some(agent.config.version.clone()),
                Some(agent.source),
            ),
            None => (None, None, None),
        };

        DecisionRecord {
            id: self.meta.id,
            created_at: self.meta.created_at,
            event_id: self.event_id,
            customer_key: self.customer_key,
            outcome,
            final_status: outcome.final_status(),
            draft: self.last_draft,
            attempt_count: self.attempts.len() as u32,
            attempts: self.attempts,
            agent_id,
            agent_version,
            config_source,
            feature_context_available: self.feature_context_available,
            reason,
            rejection_category,
            error: error.map(ErrorDetail::from),
            transitions: self.transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentConfig, ConfigSource, Customer, FinalStatus, RejectionCategory};

    fn event() -> CustomerEvent {
        CustomerEvent {
            event_id: Some("evt-1".to_string()),
            customer: Customer {
                first_name: "John".to_string(),
                email: Some("john@example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn meta() -> RunMeta {
        RunMeta::new("dec-1-0001", DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_finish_exhausted_carries_last_reason() {
        let mut state = RunState::new(meta(), &event());
        state.set_agent(ResolvedAgent::fallback(AgentConfig::fallback("upsell-generator", "m")));
        state.record(
            Draft::new(1, "s1", "b1"),
            Verdict::reject(RejectionCategory::Brand, 4, "too pushy"),
        );
        state.record(
            Draft::new(2, "s2", "b2"),
            Verdict::reject(RejectionCategory::ServiceValidity, 5, "not offered"),
        );

        let record = state.finish(RunOutcome::Exhausted, None);
        assert_eq!(record.final_status, FinalStatus::Rejected);
        assert_eq!(record.attempt_count, 2);
        assert_eq!(record.draft.as_ref().map(|d| d.subject.as_str()), Some("s2"));
        assert_eq!(record.reason.as_deref(), Some("not offered"));
        assert_eq!(record.rejection_category, Some(RejectionCategory::ServiceValidity));
        assert_eq!(record.config_source, Some(ConfigSource::Fallback));
        assert_eq!(record.agent_version.as_deref(), Some("legacy"));
        assert!(record.is_well_formed());
        assert_eq!(
            record.transitions.last(),
            Some(&RunPhase::Terminal {
                outcome: RunOutcome::Exhausted
            })
        );
    }

    #[test]
    fn test_finish_errored_without_agent() {
        let state = RunState::new(meta(), &event());
        let err = UpsellError::ConfigUnavailable("no agent".to_string());
        let record = state.finish(RunOutcome::Errored, Some(&err));
        assert_eq!(record.attempt_count, 0);
        assert!(record.agent_version.is_none());
        assert!(record.error.is_some());
        assert!(record.reason.unwrap().contains("no agent"));
        assert_eq!(record.event_id.as_deref(), Some("evt-1"));
        assert_eq!(record.customer_key, "john@example.com");
    }
}
