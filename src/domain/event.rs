//! Inbound customer event.
//!
//! The schema is permissive: only a customer identity (email or id) and at
//! least one service-history entry are required. Everything else is optional
//! and unknown fields are ignored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::features::LifetimeValue;
use crate::error::{Result, UpsellError};

/// Customer identity and contact fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

/// One completed service visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEntry {
    pub service_type: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
    /// 1-5 rating left by the customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfaction_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpcomingService {
    pub service_type: String,
    pub date: NaiveDate,
}

/// Property attributes used to tailor recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pest_issues: Vec<String>,
}

/// Immutable input to one orchestration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    pub customer: Customer,
    #[serde(default)]
    pub service_history: Vec<ServiceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upcoming_service: Option<UpcomingService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_value: Option<LifetimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_created: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upsell_sent: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyInfo>,
}

fn default_event_type() -> String {
    "service_completed".to_string()
}

impl CustomerEvent {
    /// Parse and validate an event from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let event: CustomerEvent =
            serde_json::from_str(json).map_err(|e| UpsellError::InvalidEvent(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    /// Reject events that lack an identity or any service history.
    pub fn validate(&self) -> Result<()> {
        if self.customer_key().is_none() {
            return Err(UpsellError::InvalidEvent(
                "customer must have an email or id".to_string(),
            ));
        }
        if self.service_history.is_empty() {
            return Err(UpsellError::InvalidEvent(
                "service_history must contain at least one entry".to_string(),
            ));
        }
        for entry in &self.service_history {
            if let Some(score) = entry.satisfaction_score
                && !(1..=5).contains(&score)
            {
                return Err(UpsellError::InvalidEvent(format!(
                    "satisfaction_score {} out of range 1-5",
                    score
                )));
            }
        }
        Ok(())
    }

    /// Stable key for feature lookup: email, falling back to id.
    pub fn customer_key(&self) -> Option<&str> {
        self.customer
            .email
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.customer.id.as_deref().filter(|s| !s.trim().is_empty()))
    }

    /// First name, or a neutral greeting when the event doesn't carry one.
    pub fn first_name(&self) -> &str {
        let name = self.customer.first_name.trim();
        if name.is_empty() { "Valued Customer" } else { name }
    }

    /// The most recent service by date. History is not assumed sorted.
    pub fn most_recent_service(&self) -> Option<&ServiceEntry> {
        self.service_history.iter().max_by_key(|s| s.date)
    }

    /// Service history, newest first.
    pub fn history_newest_first(&self) -> Vec<&ServiceEntry> {
        let mut history: Vec<&ServiceEntry> = self.service_history.iter().collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        history
    }

    /// Whether the customer is paid up. Missing status counts as current.
    pub fn payment_current(&self) -> bool {
        self.payment_status
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("current"))
            .unwrap_or(true)
    }
}
