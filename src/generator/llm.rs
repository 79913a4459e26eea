//! Generator backed by an LLM client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::MessageGenerator;
use super::subject::fallback_subject;
use crate::domain::{AgentConfig, CustomerEvent, Draft, FeatureContext, PriorFeedback, RejectionCategory};
use crate::error::{ModelStage, Result, UpsellError};
use crate::guidelines::{BrandRules, ServiceCatalog};
use crate::llm::{CompletionRequest, LlmClient, strip_code_fence};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::GENERATOR_SYSTEM;

/// Temperature added on each retry so a rejected draft isn't simply repeated.
pub const RETRY_TEMPERATURE_STEP: f32 = 0.1;

/// What to fix, per rejection category.
pub fn category_guidance(category: RejectionCategory) -> &'static str {
    match category {
        RejectionCategory::Appropriateness => {
            "Keep the message gentle, apply no pressure, and do not refer to any recent service problem."
        }
        RejectionCategory::ServiceValidity => {
            "Recommend a different service that appears in the catalog by its exact name and is not the customer's current plan."
        }
        RejectionCategory::Brand => {
            "Rewrite to match the brand voice: remove overclaiming and avoided phrases, and keep every fact consistent with the customer data."
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackContext {
    pub attempt: u32,
    pub category: RejectionCategory,
    pub text: String,
    pub issues: Vec<String>,
    pub guidance: &'static str,
}

/// Everything the generator template can reference.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationContext {
    pub customer_json: String,
    pub first_name: String,
    pub current_plan: Option<String>,
    pub catalog: String,
    pub brand: String,
    pub min_words: usize,
    pub max_words: usize,
    pub features: Option<String>,
    pub feedback: Option<FeedbackContext>,
}

impl GenerationContext {
    /// Pure function of its inputs.
    pub fn build(
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        prior: Option<&PriorFeedback>,
        catalog: &ServiceCatalog,
        brand: &BrandRules,
    ) -> Result<Self> {
        Ok(Self {
            customer_json: serde_json::to_string_pretty(event)?,
            first_name: event.first_name().to_string(),
            current_plan: event.current_plan.clone(),
            catalog: catalog.prompt_text(),
            brand: brand.prompt_text(),
            min_words: brand.min_words,
            max_words: brand.max_words,
            features: features.map(FeatureContext::prompt_text),
            feedback: prior.map(|p| FeedbackContext {
                attempt: p.attempt,
                category: p.category,
                text: p.feedback.clone(),
                issues: p.issues.clone(),
                guidance: category_guidance(p.category),
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default, alias = "message")]
    body: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default, alias = "recommended_service")]
    service: Option<String>,
}

/// Turn model output into a draft.
///
/// JSON output is preferred. Plain text becomes the body with zero
/// confidence and a deterministic subject. An empty body is fatal.
pub fn parse_draft(text: &str, event: &CustomerEvent, attempt: u32) -> Result<Draft> {
    let cleaned = strip_code_fence(text);

    let draft = match serde_json::from_str::<RawDraft>(cleaned) {
        Ok(raw) => {
            let body = raw.body.unwrap_or_default().trim().to_string();
            let subject = raw
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback_subject(event));
            let mut draft = Draft::new(attempt, subject, body).with_confidence(raw.confidence.unwrap_or(0.0));
            if let Some(service) = raw.service.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
                draft = draft.with_service(service);
            }
            draft
        }
        Err(_) => {
            log::debug!("Generator returned plain text on attempt {}", attempt);
            Draft::new(attempt, fallback_subject(event), cleaned.to_string())
        }
    };

    if draft.body.is_empty() {
        return Err(UpsellError::FatalModelFailure {
            stage: ModelStage::Generator,
            message: "model returned an empty message body".to_string(),
        });
    }
    Ok(draft)
}

/// Generator that renders a Handlebars prompt and calls an LLM.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    catalog: Arc<ServiceCatalog>,
    brand: Arc<BrandRules>,
    timeout: Duration,
}

impl LlmGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        catalog: Arc<ServiceCatalog>,
        brand: Arc<BrandRules>,
    ) -> Self {
        Self {
            client,
            renderer,
            catalog,
            brand,
            timeout: Duration::from_secs(60),
        }
    }

    /// Bound on one model call; exceeding it is a transient failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Agent temperature on attempt 1, raised per retry, capped at 1.0.
    pub fn temperature_for(agent: &AgentConfig, attempt: u32) -> f32 {
        let bump = RETRY_TEMPERATURE_STEP * attempt.saturating_sub(1) as f32;
        (agent.parameters.temperature + bump).min(1.0)
    }

    /// Render the full request without sending it.
    pub fn build_request(
        &self,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        agent: &AgentConfig,
        prior: Option<&PriorFeedback>,
        attempt: u32,
    ) -> Result<CompletionRequest> {
        let context = GenerationContext::build(event, features, prior, &self.catalog, &self.brand)?;
        let template = self.renderer.generator_template(agent.prompt_template.as_deref());
        let prompt = self.renderer.render_named(template, &context)?;

        Ok(CompletionRequest::new(GENERATOR_SYSTEM, prompt)
            .with_model(agent.model.clone())
            .with_max_tokens(agent.parameters.max_tokens)
            .with_temperature(Self::temperature_for(agent, attempt)))
    }
}

#[async_trait]
impl MessageGenerator for LlmGenerator {
    async fn generate(
        &self,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        agent: &AgentConfig,
        prior: Option<&PriorFeedback>,
        attempt: u32,
    ) -> Result<Draft> {
        let request = self.build_request(event, features, agent, prior, attempt)?;
        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| UpsellError::GenerationUnavailable {
                message: format!("generator timed out after {:?}", self.timeout),
                retry_after: None,
            })?
            .map_err(|e| UpsellError::from_llm(ModelStage::Generator, e))?;
        if response.is_truncated() {
            log::warn!("Generator reply for attempt {} hit the token limit", attempt);
        }
        parse_draft(&response.content, event, attempt)
    }
}
