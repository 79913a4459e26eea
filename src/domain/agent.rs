//! Versioned agent configuration.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpsellError};

/// Version stamped into records when the built-in default is used.
pub const FALLBACK_VERSION: &str = "legacy";

/// Lifecycle status of an agent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Draft,
    Testing,
    Production,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Draft => write!(f, "draft"),
            AgentStatus::Testing => write!(f, "testing"),
            AgentStatus::Production => write!(f, "production"),
        }
    }
}

/// Sampling parameters for the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent_id: String,
    pub version: String,
    pub model: String,
    /// Name of a registered prompt template; `None` means the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub parameters: GenerationParams,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl AgentConfig {
    pub fn new(
        agent_id: impl Into<String>,
        version: impl Into<String>,
        model: impl Into<String>,
        status: AgentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            version: version.into(),
            model: model.into(),
            prompt_template: None,
            parameters: GenerationParams::default(),
            status,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Built-in default used when nothing is promoted to production.
    pub fn fallback(agent_id: impl Into<String>, model: impl Into<String>) -> Self {
        let mut config = Self::new(agent_id, FALLBACK_VERSION, model, AgentStatus::Production);
        config.description = Some("Built-in default configuration".to_string());
        config
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.parameters.temperature = temperature;
        self
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.prompt_template = Some(name.into());
        self
    }

    /// Check required fields, version format, and parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(UpsellError::InvalidAgent("agent_id is required".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(UpsellError::InvalidAgent("model is required".to_string()));
        }
        if parse_version(&self.version).is_none() {
            return Err(UpsellError::InvalidAgent(format!(
                "version '{}' must be dotted numeric (e.g. 1.2.0)",
                self.version
            )));
        }
        if !(0.0..=1.0).contains(&self.parameters.temperature) {
            return Err(UpsellError::InvalidAgent(format!(
                "temperature {} must be within 0.0-1.0",
                self.parameters.temperature
            )));
        }
        if self.parameters.max_tokens == 0 {
            return Err(UpsellError::InvalidAgent("max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.status == AgentStatus::Production
    }
}

/// Parse a dotted numeric version like `1.10.2`.
pub fn parse_version(version: &str) -> Option<Vec<u64>> {
    if version.trim().is_empty() {
        return None;
    }
    version.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

/// Compare two versions numerically. Unparseable versions sort first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Registry,
    Fallback,
}

/// Configuration chosen for a run, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAgent {
    pub config: AgentConfig,
    pub source: ConfigSource,
}

impl ResolvedAgent {
    pub fn registry(config: AgentConfig) -> Self {
        Self {
            config,
            source: ConfigSource::Registry,
        }
    }

    pub fn fallback(config: AgentConfig) -> Self {
        Self {
            config,
            source: ConfigSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok() {
        let config = AgentConfig::new("upsell-generator", "1.0.0", "claude-sonnet-4-20250514", AgentStatus::Draft);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_version() {
        let config = AgentConfig::new("a", "v1", "m", AgentStatus::Draft);
        assert!(matches!(config.validate(), Err(UpsellError::InvalidAgent(_))));
        let config = AgentConfig::new("a", "1..0", "m", AgentStatus::Draft);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(AgentConfig::new("", "1.0", "m", AgentStatus::Draft).validate().is_err());
        assert!(AgentConfig::new("a", "1.0", " ", AgentStatus::Draft).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_temperature() {
        let config = AgentConfig::new("a", "1.0", "m", AgentStatus::Draft).with_temperature(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compare_versions_numeric() {
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_fallback_is_production_legacy() {
        let config = AgentConfig::fallback("upsell-generator", "claude-sonnet-4-20250514");
        assert_eq!(config.version, FALLBACK_VERSION);
        assert!(config.is_live());
    }

    #[test]
    fn test_agent_config_deserialize_defaults() {
        let json = r#"{"agent_id": "g", "version": "1.0.0", "model": "m", "status": "testing"}"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.status, AgentStatus::Testing);
        assert_eq!(config.parameters.temperature, 0.7);
        assert_eq!(config.parameters.max_tokens, 1000);
        assert!(config.prompt_template.is_none());
    }
}
