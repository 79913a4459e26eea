//! Message evaluation against the fixed rejection taxonomy.
//!
//! Three independent criteria are checked in order: appropriateness,
//! service validity, and brand. The first failure is the rejection category.

mod llm_judge;
pub mod rules;

use async_trait::async_trait;

pub use llm_judge::{CriterionCheck, LlmJudge, ModelJudgement, merge, parse_judgement};
pub use rules::{RuleFinding, RuleGates};

use crate::domain::{CustomerEvent, Draft, FeatureContext, Verdict};
use crate::error::Result;
use crate::guidelines::{BrandRules, ServiceCatalog};

/// Pure evaluation of one draft.
#[async_trait]
pub trait MessageJudge: Send + Sync {
    async fn evaluate(
        &self,
        draft: &Draft,
        event: &CustomerEvent,
        features: Option<&FeatureContext>,
        catalog: &ServiceCatalog,
        brand: &BrandRules,
    ) -> Result<Verdict>;
}
