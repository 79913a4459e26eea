//! Global configuration.
//!
//! Loaded from ./upsellr.yml or ~/.config/upsellr/upsellr.yml

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use upsellr::llm::{AnthropicConfig, TransportRetry};
use upsellr::orchestrator::{DEFAULT_AGENT_ID, RetryPolicy};

/// Global configuration for Upsellr.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Agent whose production version drives generation.
    #[serde(rename = "agent-id")]
    pub agent_id: String,

    /// LLM provider settings.
    pub llm: LlmConfig,

    /// Attempt budget and judge rule thresholds.
    pub orchestration: OrchestrationConfig,

    /// Transport-level retry settings.
    pub transport: TransportConfig,

    /// Decision store settings.
    pub storage: StorageConfig,

    /// Registry, feature store, and guideline files.
    pub sources: SourcesConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            agent_id: DEFAULT_AGENT_ID.to_string(),
            llm: LlmConfig::default(),
            orchestration: OrchestrationConfig::default(),
            transport: TransportConfig::default(),
            storage: StorageConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Explicit path, then `./upsellr.yml`, then the user config dir, then defaults.
    ///
    /// An explicit path must load. Discovered files that fail to parse are
    /// skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_yaml_file(path).wrap_err_with(|| format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if !candidate.is_file() {
                continue;
            }
            match Self::from_yaml_file(&candidate) {
                Ok(config) => {
                    log::info!("Using config {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => log::warn!("Skipping unreadable config {}: {:#}", candidate.display(), e),
            }
        }

        log::info!("No upsellr.yml found, running with built-in defaults");
        Ok(Self::default())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("upsellr.yml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("upsellr").join("upsellr.yml"));
        }
        paths
    }

    fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).wrap_err("read failed")?;
        serde_yaml::from_str(&text).wrap_err("invalid YAML")
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.orchestration.max_attempts == 0 {
            eyre::bail!("orchestration.max-attempts must be > 0");
        }
        if self.llm.timeout_ms == 0 {
            eyre::bail!("llm.timeout-ms must be > 0");
        }
        if self.orchestration.run_timeout_ms == 0 {
            eyre::bail!("orchestration.run-timeout-ms must be > 0");
        }
        if self.transport.initial_backoff_ms > self.transport.max_backoff_ms {
            eyre::bail!("transport.initial-backoff-ms must not exceed transport.max-backoff-ms");
        }
        if self.agent_id.trim().is_empty() {
            eyre::bail!("agent-id must not be empty");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.orchestration.max_attempts)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.orchestration.run_timeout_ms)
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model used by the judge and by the fallback agent configuration.
    pub model: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Timeout per LLM call in milliseconds.
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Environment variable holding the API key.
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let anthropic = AnthropicConfig::default();
        Self {
            model: anthropic.model,
            max_tokens: anthropic.max_tokens,
            timeout_ms: 60_000,
            api_key_env: anthropic.api_key_env,
            base_url: anthropic.base_url,
        }
    }
}

impl LlmConfig {
    pub fn to_anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

/// Attempt budget and judge rule thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Total attempts including the first.
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Minimum days between upsells to one customer.
    #[serde(rename = "cooldown-days")]
    pub cooldown_days: i64,

    /// Most recent satisfaction below this blocks contact.
    #[serde(rename = "min-satisfaction")]
    pub min_satisfaction: u8,

    /// Deadline for one whole run in milliseconds.
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown_days: 30,
            min_satisfaction: 4,
            run_timeout_ms: 300_000, // 5 minutes
        }
    }
}

/// Transport-level retry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl TransportConfig {
    pub fn to_retry(&self) -> TransportRetry {
        TransportRetry::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory for decisions, features, and agents.
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Decision log file name, relative to the data dir.
    #[serde(rename = "decisions-file")]
    pub decisions_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let default_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("upsellr");

        Self {
            data_dir: default_dir,
            decisions_file: "decisions.jsonl".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn decisions_path(&self) -> PathBuf {
        self.data_dir.join(&self.decisions_file)
    }
}

/// Source files for the injected collaborators.
///
/// Relative paths resolve against the storage data dir.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub agents: PathBuf,
    pub features: PathBuf,
    /// Brand rules and service catalog; built-in defaults when missing.
    pub guidelines: PathBuf,
    /// Extra `*.hbs` prompt templates.
    #[serde(rename = "templates-dir")]
    pub templates_dir: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            agents: PathBuf::from("agents.json"),
            features: PathBuf::from("features.json"),
            guidelines: PathBuf::from("guidelines.json"),
            templates_dir: None,
        }
    }
}

impl SourcesConfig {
    pub fn resolve(&self, data_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }
}
