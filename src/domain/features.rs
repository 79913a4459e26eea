//! Precomputed customer features used to personalize generation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime-value tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifetimeValue {
    High,
    Medium,
    Low,
}

impl LifetimeValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifetimeValue::High => "high",
            LifetimeValue::Medium => "medium",
            LifetimeValue::Low => "low",
        }
    }
}

impl fmt::Display for LifetimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pest_issues: Vec<String>,
}

/// Read-only feature bundle for one customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureContext {
    /// Running satisfaction average, always within 0..=5
    pub satisfaction_avg: f64,
    pub service_count: u32,
    pub lifetime_value: LifetimeValue,
    #[serde(default)]
    pub property: PropertyFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl FeatureContext {
    pub fn new(satisfaction_avg: f64, service_count: u32, lifetime_value: LifetimeValue) -> Self {
        Self {
            satisfaction_avg: clamp_satisfaction(satisfaction_avg),
            service_count,
            lifetime_value,
            property: PropertyFeatures::default(),
            last_updated: None,
        }
    }

    pub fn with_property(mut self, property: PropertyFeatures) -> Self {
        self.property = property;
        self
    }

    /// Human-readable block for inclusion in the generation prompt.
    pub fn prompt_text(&self) -> String {
        let mut lines = vec![
            format!("- Satisfaction average: {:.2}/5", self.satisfaction_avg),
            format!("- Services completed: {}", self.service_count),
            format!("- Lifetime value: {}", self.lifetime_value),
        ];

        let p = &self.property;
        let location: Vec<&str> = [p.city.as_deref(), p.state.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !location.is_empty() {
            lines.push(format!("- Location: {}", location.join(", ")));
        }
        if let Some(kind) = &p.property_type {
            lines.push(format!("- Property type: {}", kind));
        }
        if let Some(sqft) = p.square_feet {
            lines.push(format!("- Square feet: {}", sqft));
        }
        if let Some(year) = p.year_built {
            lines.push(format!("- Year built: {}", year));
        }
        if !p.pest_issues.is_empty() {
            lines.push(format!("- Known pest issues: {}", p.pest_issues.join(", ")));
        }

        lines.join("\n")
    }
}

/// Clamp to 0..=5 and round to two decimals. NaN becomes 0.
pub fn clamp_satisfaction(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value.clamp(0.0, 5.0) * 100.0).round() / 100.0
}
