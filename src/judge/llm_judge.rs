//! LLM-as-judge evaluation.
//!
//! The model scores the draft and reports pass/fail per criterion. Its
//! per-criterion results are merged with the deterministic rule gates, and
//! the first failing criterion in fixed order becomes the rejection category.
//! The score is reported for monitoring only and never decides approval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::MessageJudge;
use super::rules::{RuleFinding, RuleGates};
use crate::domain::{CustomerEvent, Draft, FeatureContext, MAX_SCORE, RejectionCategory, Verdict};
use crate::error::{ModelStage, Result, UpsellError};
use crate::guidelines::{BrandRules, ServiceCatalog};
use crate::llm::{CompletionRequest, LlmClient, strip_code_fence};
use crate::prompt::templates::JUDGE_SYSTEM;
use crate::prompt::{JUDGE_TEMPLATE_NAME, PromptRenderer};

/// The model's result for one criterion.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CriterionCheck {
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
struct RawChecks {
    appropriateness: Option<CriterionCheck>,
    service_validity: Option<CriterionCheck>,
    brand: Option<CriterionCheck>,
}

#[derive(Debug, Deserialize)]
struct RawJudgement {
    checks: RawChecks,
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    issues: Vec<String>,
}

/// Validated model output, before merging with rule findings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelJudgement {
    pub appropriateness: CriterionCheck,
    pub service_validity: CriterionCheck,
    pub brand: CriterionCheck,
    pub score: u8,
    pub feedback: String,
    pub issues: Vec<String>,
}

impl ModelJudgement {
    pub fn check(&self, category: RejectionCategory) -> &CriterionCheck {
        match category {
            RejectionCategory::Appropriateness => &self.appropriateness,
            RejectionCategory::ServiceValidity => &self.service_validity,
            RejectionCategory::Brand => &self.brand,
        }
    }
}

/// Parse the judge's JSON response. Anything off-schema is `InvalidJudgeOutput`.
pub fn parse_judgement(text: &str) -> Result<ModelJudgement> {
    let cleaned = strip_code_fence(text);
    let raw: RawJudgement =
        serde_json::from_str(cleaned).map_err(|e| UpsellError::InvalidJudgeOutput(format!("{}", e)))?;

    let missing = |name: &str| UpsellError::InvalidJudgeOutput(format!("missing check '{}'", name));
    let appropriateness = raw.checks.appropriateness.ok_or_else(|| missing("appropriateness"))?;
    let service_validity = raw.checks.service_validity.ok_or_else(|| missing("service_validity"))?;
    let brand = raw.checks.brand.ok_or_else(|| missing("brand"))?;

    if !raw.score.is_finite() || raw.score < 0.0 || raw.score > MAX_SCORE as f64 {
        return Err(UpsellError::InvalidJudgeOutput(format!(
            "score {} outside 0-{}",
            raw.score, MAX_SCORE
        )));
    }

    Ok(ModelJudgement {
        appropriateness,
        service_validity,
        brand,
        score: raw.score.round() as u8,
        feedback: raw.feedback.trim().to_string(),
        issues: raw.issues,
    })
}

/// Combine model checks with rule findings into a verdict.
pub fn merge(judgement: ModelJudgement, findings: &[RuleFinding]) -> Verdict {
    let mut issues = judgement.issues.clone();
    issues.extend(findings.iter().map(|f| f.message.clone()));

    for category in RejectionCategory::ALL {
        let rule_messages: Vec<&str> = findings
            .iter()
            .filter(|f| f.category == category)
            .map(|f| f.message.as_str())
            .collect();
        let check = judgement.check(category);

        if rule_messages.is_empty() && check.passed {
            continue;
        }

        let mut parts: Vec<&str> = rule_messages;
        if !check.passed && !check.feedback.trim().is_empty() {
            parts.push(check.feedback.trim());
        }
        let feedback = if parts.is_empty() {
            judgement.feedback.clone()
        } else {
            parts.join("; ")
        };

        return Verdict::reject(category, judgement.score, feedback).with_issues(issues);
    }

    Verdict::approve(judgement.score, judgement.feedback).with_issues(issues)
}

#[derive(Debug, Serialize)]
struct JudgeContext<'a> {
    today: String,
    customer_json: String,
    features: Option<String>,
    catalog: String,
    brand: String,
    subject: &'a str,
    body: &'a str,
    service: &'a str,
    cooldown_days: i64,
}

/// Judge backed by an LLM client plus deterministic rule gates.
pub struct LlmJudge {
    client: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    rules: RuleGates,
    model: Option<String>,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    today: Option<NaiveDate>,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LlmClient>, renderer: Arc<PromptRenderer>) -> Self {
        Self {
            client,
            renderer,
            rules: RuleGates::default(),
            model: None,
            timeout: Duration::from_secs(60),
            max_tokens: 500,
            temperature: 0.3,
            today: None,
        }
    }

    pub fn with_rules(mut self, rules: RuleGates) -> Self {
        self.rules = rules;
        self
    }

    /// Use a specific model instead of the client's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Pin the evaluation date (cooldown arithmetic) for reproducible runs.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn build_request(
        &self,
        draft: &Draft,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        catalog: &ServiceCatalog,
        brand: &BrandRules,
        today: NaiveDate,
    ) -> Result<CompletionRequest> {
        let context = JudgeContext {
            today: today.to_string(),
            customer_json: serde_json::to_string_pretty(event)?,
            features: features.map(FeatureContext::prompt_text),
            catalog: catalog.prompt_text(),
            brand: brand.prompt_text(),
            subject: &draft.subject,
            body: &draft.body,
            service: draft.recommended_service.as_deref().unwrap_or("(not stated)"),
            cooldown_days: self.rules.cooldown_days,
        };
        let prompt = self.renderer.render_named(JUDGE_TEMPLATE_NAME, &context)?;

        let mut request = CompletionRequest::new(JUDGE_SYSTEM, prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        Ok(request)
    }
}

#[async_trait]
impl MessageJudge for LlmJudge {
    async fn evaluate(
        &self,
        draft: &Draft,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        catalog: &ServiceCatalog,
        brand: &BrandRules,
    ) -> Result<Verdict> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let findings = self.rules.check(draft, event, catalog, brand, today);
        if !findings.is_empty() {
            log::debug!("Rule gates flagged {} finding(s) on attempt {}", findings.len(), draft.attempt);
        }

        let request = self.build_request(draft, event, features, catalog, brand, today)?;
        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| UpsellError::JudgeUnavailable {
                message: format!("judge timed out after {:?}", self.timeout),
                retry_after: None,
            })?
            .map_err(|e| UpsellError::from_llm(ModelStage::Judge, e))?;

        if response.is_truncated() {
            log::warn!("Judge reply for attempt {} hit the token limit", draft.attempt);
        }
        let judgement = parse_judgement(&response.content)?;
        Ok(merge(judgement, &findings))
    }
}
