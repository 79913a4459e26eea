//! Orchestration loop properties, driven by scripted generator and judge stubs.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use upsellr::domain::{
    AgentConfig, Customer, CustomerEvent, FeatureContext, FinalStatus, LifetimeValue, RejectionCategory, RunOutcome,
    RunPhase, ServiceEntry, Verdict,
};
use upsellr::orchestrator::scripted::{ScriptedGenerator, ScriptedJudge};
use upsellr::orchestrator::{DEFAULT_AGENT_ID, Orchestrator, RetryPolicy, RunMeta};
use upsellr::resolver::{AgentRegistry, FeatureStore, NoFeatures};

fn event() -> CustomerEvent {
    CustomerEvent {
        event_id: Some("evt-100".to_string()),
        customer: Customer {
            first_name: "John".to_string(),
            email: Some("john@example.com".to_string()),
            ..Default::default()
        },
        service_history: vec![ServiceEntry {
            service_type: "Quarterly Pest Control".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            technician: Some("Mike".to_string()),
            satisfaction_score: Some(5),
            notes: None,
        }],
        current_plan: Some("Quarterly Pest Control".to_string()),
        ..Default::default()
    }
}

fn reject(category: RejectionCategory) -> Verdict {
    Verdict::reject(category, 5, format!("fix {}", category))
}

fn approve() -> Verdict {
    Verdict::approve(8, "looks good")
}

fn agents() -> Arc<AgentRegistry> {
    Arc::new(AgentRegistry::in_memory().with_fallback(AgentConfig::fallback(DEFAULT_AGENT_ID, "test-model")))
}

struct Harness {
    generator: Arc<ScriptedGenerator>,
    judge: Arc<ScriptedJudge>,
    orchestrator: Orchestrator,
}

fn harness(verdicts: Vec<Verdict>, max_attempts: u32) -> Harness {
    harness_with_features(verdicts, max_attempts, None)
}

fn harness_with_features(verdicts: Vec<Verdict>, max_attempts: u32, features: Option<FeatureContext>) -> Harness {
    let generator = Arc::new(ScriptedGenerator::new());
    let judge = Arc::new(ScriptedJudge::with_verdicts(verdicts));
    let orchestrator = match features {
        Some(context) => {
            let store = FeatureStore::in_memory();
            store.insert("john@example.com", context).unwrap();
            Orchestrator::new(Arc::new(store), agents(), generator.clone(), judge.clone())
        }
        None => Orchestrator::new(Arc::new(NoFeatures), agents(), generator.clone(), judge.clone()),
    }
    .with_policy(RetryPolicy::new(max_attempts));
    Harness {
        generator,
        judge,
        orchestrator,
    }
}

fn meta() -> RunMeta {
    RunMeta::new("dec-fixed-0001", DateTime::from_timestamp(1_736_500_000, 0).unwrap())
}

#[tokio::test]
async fn test_default_budget_is_three_attempts() {
    assert_eq!(RetryPolicy::default().max_attempts, 3);

    let h = harness(
        vec![
            reject(RejectionCategory::Brand),
            reject(RejectionCategory::Brand),
            reject(RejectionCategory::Brand),
            approve(),
        ],
        3,
    );
    let record = h.orchestrator.run(&event()).await.unwrap();
    assert_eq!(record.attempt_count, 3);
    assert_eq!(record.outcome, RunOutcome::Exhausted);
    assert_eq!(h.judge.call_count(), 3);
}

#[tokio::test]
async fn test_attempt_count_stays_within_budget() {
    for max_attempts in 1..=5 {
        let verdicts = vec![reject(RejectionCategory::ServiceValidity); 10];
        let h = harness(verdicts, max_attempts);
        let record = h.orchestrator.run(&event()).await.unwrap();
        assert!(record.attempt_count >= 1);
        assert_eq!(record.attempt_count, max_attempts);
        assert!(record.is_well_formed());
    }
}

#[tokio::test]
async fn test_appropriateness_rejection_terminates_immediately() {
    for at in 1..=3u32 {
        let mut verdicts: Vec<Verdict> = (1..at).map(|_| reject(RejectionCategory::Brand)).collect();
        verdicts.push(reject(RejectionCategory::Appropriateness));
        verdicts.push(approve());

        let h = harness(verdicts, 3);
        let record = h.orchestrator.run(&event()).await.unwrap();
        assert_eq!(record.outcome, RunOutcome::Rejected);
        assert_eq!(record.final_status, FinalStatus::Rejected);
        assert_eq!(record.attempt_count, at);
        assert_eq!(record.rejection_category, Some(RejectionCategory::Appropriateness));
        assert_eq!(h.generator.call_count(), at as usize);
    }
}

#[tokio::test]
async fn test_approval_at_attempt_n() {
    for n in 1..=3u32 {
        let mut verdicts: Vec<Verdict> = (1..n).map(|_| reject(RejectionCategory::ServiceValidity)).collect();
        verdicts.push(approve());

        let h = harness(verdicts, 3);
        let record = h.orchestrator.run(&event()).await.unwrap();
        assert_eq!(record.final_status, FinalStatus::Approved);
        assert_eq!(record.attempts.len(), n as usize);
        assert_eq!(record.draft.as_ref().map(|d| d.attempt), Some(n));
        assert!(record.is_sendable());
    }
}

#[tokio::test]
async fn test_brand_service_brand_exhausts() {
    let h = harness(
        vec![
            reject(RejectionCategory::Brand),
            reject(RejectionCategory::ServiceValidity),
            reject(RejectionCategory::Brand),
        ],
        3,
    );
    let record = h.orchestrator.run(&event()).await.unwrap();

    assert_eq!(record.outcome, RunOutcome::Exhausted);
    assert_eq!(record.final_status, FinalStatus::Rejected);
    assert_eq!(record.attempt_count, 3);
    assert_eq!(record.draft.as_ref().map(|d| d.attempt), Some(3));
    assert_eq!(record.reason.as_deref(), Some("fix brand"));
    assert!(!record.is_sendable());
}

#[tokio::test]
async fn test_service_validity_then_approved() {
    let h = harness(vec![reject(RejectionCategory::ServiceValidity), approve()], 3);
    let record = h.orchestrator.run(&event()).await.unwrap();

    assert_eq!(record.outcome, RunOutcome::Approved);
    assert_eq!(record.attempt_count, 2);
    let winner = record.draft.as_ref().unwrap();
    assert_eq!(winner.subject, "Subject 2");
    assert_eq!(winner, &record.attempts[1].draft);
}

#[tokio::test]
async fn test_single_appropriateness_rejection() {
    let h = harness(vec![reject(RejectionCategory::Appropriateness)], 3);
    let record = h.orchestrator.run(&event()).await.unwrap();

    assert_eq!(record.outcome, RunOutcome::Rejected);
    assert_eq!(record.attempt_count, 1);
    assert_eq!(h.generator.call_count(), 1);
}

#[tokio::test]
async fn test_retry_carries_previous_feedback() {
    let h = harness(
        vec![reject(RejectionCategory::Brand), reject(RejectionCategory::ServiceValidity), approve()],
        3,
    );
    h.orchestrator.run(&event()).await.unwrap();

    let calls = h.generator.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].prior.is_none());

    let second = calls[1].prior.as_ref().unwrap();
    assert_eq!(second.attempt, 1);
    assert_eq!(second.category, RejectionCategory::Brand);

    // Only the immediately preceding verdict is carried
    let third = calls[2].prior.as_ref().unwrap();
    assert_eq!(third.attempt, 2);
    assert_eq!(third.category, RejectionCategory::ServiceValidity);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let verdicts = vec![
        reject(RejectionCategory::Brand),
        reject(RejectionCategory::ServiceValidity),
        approve(),
    ];

    let first = harness(verdicts.clone(), 3).orchestrator.replay(meta(), &event()).await.unwrap();
    let second = harness(verdicts, 3).orchestrator.replay(meta(), &event()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_feature_presence_does_not_change_transitions() {
    let verdicts = vec![reject(RejectionCategory::Brand), approve()];
    let features = FeatureContext::new(4.6, 8, LifetimeValue::High);

    let without = harness(verdicts.clone(), 3).orchestrator.replay(meta(), &event()).await.unwrap();
    let with_h = harness_with_features(verdicts, 3, Some(features));
    let with = with_h.orchestrator.replay(meta(), &event()).await.unwrap();

    assert!(!without.feature_context_available);
    assert!(with.feature_context_available);
    assert_eq!(without.transitions, with.transitions);
    assert_eq!(without.outcome, with.outcome);
    assert!(with_h.generator.calls().iter().all(|c| c.had_features));
}

#[tokio::test]
async fn test_transition_trace() {
    let h = harness(vec![reject(RejectionCategory::Brand), approve()], 3);
    let record = h.orchestrator.run(&event()).await.unwrap();

    assert_eq!(
        record.transitions,
        vec![
            RunPhase::Init,
            RunPhase::Generating { attempt: 1 },
            RunPhase::Judging { attempt: 1 },
            RunPhase::Deciding { attempt: 1 },
            RunPhase::Retry { attempt: 1 },
            RunPhase::Generating { attempt: 2 },
            RunPhase::Judging { attempt: 2 },
            RunPhase::Deciding { attempt: 2 },
            RunPhase::Terminal {
                outcome: RunOutcome::Approved
            },
        ]
    );
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let generator = Arc::new(ScriptedGenerator::new());
    let verdicts: Vec<Verdict> = (0..8).map(|_| approve()).collect();
    let judge = Arc::new(ScriptedJudge::with_verdicts(verdicts));
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(NoFeatures), agents(), generator, judge));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orch = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let mut e = event();
            e.customer.email = Some(format!("customer{}@example.com", i));
            orch.run(&e).await
        }));
    }

    let mut customers = std::collections::HashSet::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.outcome, RunOutcome::Approved);
        assert_eq!(record.attempt_count, 1);
        assert!(record.is_well_formed());
        customers.insert(record.customer_key);
    }
    assert_eq!(customers.len(), 8);
}

#[tokio::test]
async fn test_bad_files_on_disk_still_yield_one_record() {
    use upsellr::storage::{DecisionStore, JsonlDecisionStore};

    let dir = tempfile::TempDir::new().unwrap();
    let features_path = dir.path().join("features.json");
    let decisions_path = dir.path().join("decisions.jsonl");
    std::fs::write(&features_path, "{not json").unwrap();
    std::fs::write(&decisions_path, "{\"id\": \"dec-old\", truncated\n").unwrap();

    let generator = Arc::new(ScriptedGenerator::new());
    let judge = Arc::new(ScriptedJudge::with_verdicts(vec![approve()]));
    let store = Arc::new(JsonlDecisionStore::open(&decisions_path).unwrap());
    let orchestrator = Orchestrator::new(
        Arc::new(FeatureStore::open(&features_path)),
        agents(),
        generator.clone(),
        judge,
    )
    .with_store(store.clone());

    let record = orchestrator.process(&event()).await.unwrap();
    assert_eq!(record.outcome, RunOutcome::Approved);
    assert!(!record.feature_context_available);
    assert!(!generator.calls()[0].had_features);
    assert_eq!(store.list().unwrap(), vec![record]);
}
