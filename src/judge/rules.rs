//! Deterministic rule gates.
//!
//! These run before the evaluative model pass. Facts that can be checked
//! against event data (cooldown, satisfaction, payment, catalog membership)
//! never depend on the model noticing them.

use chrono::NaiveDate;

use crate::domain::{CustomerEvent, Draft, RejectionCategory};
use crate::guidelines::{BrandRules, ServiceCatalog};

/// Phrases in service notes that signal an unresolved complaint.
const COMPLAINT_KEYWORDS: &[&str] = &[
    "complain",
    "refund",
    "frustrat",
    "unhappy",
    "dissatisf",
    "angry",
    "upset",
    "arrived late",
    "late arrival",
    "cancel",
];

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFinding {
    pub category: RejectionCategory,
    pub message: String,
}

impl RuleFinding {
    fn new(category: RejectionCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleGates {
    /// Minimum days between upsells
    pub cooldown_days: i64,
    /// Most recent satisfaction below this blocks contact
    pub min_satisfaction: u8,
    pub complaint_keywords: Vec<String>,
}

impl Default for RuleGates {
    fn default() -> Self {
        Self {
            cooldown_days: 30,
            min_satisfaction: 4,
            complaint_keywords: COMPLAINT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RuleGates {
    pub fn new(cooldown_days: i64, min_satisfaction: u8) -> Self {
        Self {
            cooldown_days,
            min_satisfaction,
            ..Default::default()
        }
    }

    /// Run every gate. Findings are returned in criterion order.
    pub fn check(
        &self,
        draft: &Draft,
        event: &CustomerEvent,
        catalog: &ServiceCatalog,
        brand: &BrandRules,
        today: NaiveDate,
    ) -> Vec<RuleFinding> {
        let mut findings = self.appropriateness(event, today);
        findings.extend(self.service_validity(draft, event, catalog));
        findings.extend(self.brand(draft, brand));
        findings
    }

    fn appropriateness(&self, event: &CustomerEvent, today: NaiveDate) -> Vec<RuleFinding> {
        let mut findings = Vec::new();

        if let Some(last) = event.last_upsell_sent {
            let days = (today - last).num_days();
            if days < self.cooldown_days {
                findings.push(RuleFinding::new(
                    RejectionCategory::Appropriateness,
                    format!(
                        "Last upsell was sent {} days ago; cooldown is {} days",
                        days.max(0),
                        self.cooldown_days
                    ),
                ));
            }
        }

        if let Some(recent) = event.most_recent_service() {
            if let Some(score) = recent.satisfaction_score
                && score < self.min_satisfaction
            {
                findings.push(RuleFinding::new(
                    RejectionCategory::Appropriateness,
                    format!(
                        "Most recent service was rated {}/5, below the minimum of {}",
                        score, self.min_satisfaction
                    ),
                ));
            }

            if let Some(notes) = &recent.notes {
                let lower = notes.to_lowercase();
                if let Some(keyword) = self.complaint_keywords.iter().find(|k| lower.contains(k.as_str())) {
                    findings.push(RuleFinding::new(
                        RejectionCategory::Appropriateness,
                        format!("Recent service notes suggest an unresolved complaint ('{}')", keyword),
                    ));
                }
            }
        }

        if !event.payment_current() {
            findings.push(RuleFinding::new(
                RejectionCategory::Appropriateness,
                format!(
                    "Payment status is '{}', not current",
                    event.payment_status.as_deref().unwrap_or_default()
                ),
            ));
        }

        findings
    }

    fn service_validity(&self, draft: &Draft, event: &CustomerEvent, catalog: &ServiceCatalog) -> Vec<RuleFinding> {
        let Some(service) = draft.recommended_service.as_deref() else {
            return Vec::new();
        };

        if !catalog.contains(service) {
            return vec![RuleFinding::new(
                RejectionCategory::ServiceValidity,
                format!("'{}' is not in the service catalog", service),
            )];
        }

        match event.current_plan.as_deref() {
            Some(plan) if plan.trim().eq_ignore_ascii_case(service.trim()) => vec![RuleFinding::new(
                RejectionCategory::ServiceValidity,
                format!("'{}' is already the customer's current plan", service),
            )],
            _ => Vec::new(),
        }
    }

    fn brand(&self, draft: &Draft, brand: &BrandRules) -> Vec<RuleFinding> {
        let text = format!("{}\n{}", draft.subject, draft.body);
        brand
            .violations(&text)
            .into_iter()
            .map(|phrase| RuleFinding::new(RejectionCategory::Brand, format!("Uses avoided phrase '{}'", phrase)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, ServiceEntry};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn event() -> CustomerEvent {
        CustomerEvent {
            customer: Customer {
                first_name: "John".to_string(),
                email: Some("john@example.com".to_string()),
                ..Default::default()
            },
            service_history: vec![ServiceEntry {
                service_type: "Quarterly Pest Control".to_string(),
                date: date("2024-12-15"),
                technician: None,
                satisfaction_score: Some(5),
                notes: Some("Customer mentioned mosquitoes in the backyard".to_string()),
            }],
            current_plan: Some("Quarterly Pest Control".to_string()),
            payment_status: Some("current".to_string()),
            ..Default::default()
        }
    }

    fn draft(service: &str) -> Draft {
        Draft::new(1, "John, reclaim your backyard", "Mosquito season is around the corner.").with_service(service)
    }

    fn check(draft: &Draft, event: &CustomerEvent) -> Vec<RuleFinding> {
        RuleGates::default().check(
            draft,
            event,
            &ServiceCatalog::builtin(),
            &BrandRules::default(),
            date("2025-01-10"),
        )
    }

    #[test]
    fn test_clean_event_passes() {
        assert!(check(&draft("Mosquito Treatment"), &event()).is_empty());
    }

    #[test]
    fn test_cooldown_window() {
        let mut e = event();
        e.last_upsell_sent = Some(date("2024-12-20"));
        let findings = check(&draft("Mosquito Treatment"), &e);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, RejectionCategory::Appropriateness);
        assert!(findings[0].message.contains("21 days ago"));

        e.last_upsell_sent = Some(date("2024-12-11"));
        assert!(check(&draft("Mosquito Treatment"), &e).is_empty());
    }

    #[test]
    fn test_low_recent_satisfaction() {
        let mut e = event();
        e.service_history[0].satisfaction_score = Some(2);
        let findings = check(&draft("Mosquito Treatment"), &e);
        assert!(findings[0].message.contains("rated 2/5"));
    }

    #[test]
    fn test_complaint_keywords_in_notes() {
        let mut e = event();
        e.service_history[0].notes = Some("Customer complained the technician arrived late".to_string());
        let findings = check(&draft("Mosquito Treatment"), &e);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, RejectionCategory::Appropriateness);
    }

    #[test]
    fn test_payment_not_current() {
        let mut e = event();
        e.payment_status = Some("past_due".to_string());
        let findings = check(&draft("Mosquito Treatment"), &e);
        assert!(findings[0].message.contains("past_due"));
    }

    #[test]
    fn test_service_not_in_catalog() {
        let findings = check(&draft("Bed Bug Heat Treatment"), &event());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, RejectionCategory::ServiceValidity);
    }

    #[test]
    fn test_service_is_current_plan() {
        let findings = check(&draft("quarterly pest control"), &event());
        assert_eq!(findings[0].category, RejectionCategory::ServiceValidity);
        assert!(findings[0].message.contains("current plan"));
    }

    #[test]
    fn test_no_service_named_skips_validity_gate() {
        let d = Draft::new(1, "Hi", "Body");
        assert!(check(&d, &event()).is_empty());
    }

    #[test]
    fn test_brand_avoided_phrase() {
        let d = Draft::new(1, "Act now, John!", "Limited time offer.").with_service("Mosquito Treatment");
        let findings = check(&d, &event());
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.category == RejectionCategory::Brand));
    }

    #[test]
    fn test_findings_in_criterion_order() {
        let mut e = event();
        e.payment_status = Some("delinquent".to_string());
        let d = Draft::new(1, "Act now", "x").with_service("Quarterly Pest Control");
        let categories: Vec<RejectionCategory> = check(&d, &e).into_iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                RejectionCategory::Appropriateness,
                RejectionCategory::ServiceValidity,
                RejectionCategory::Brand
            ]
        );
    }
}
