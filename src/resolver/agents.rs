//! Versioned agent registry and active-configuration resolution.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::agent::compare_versions;
use crate::domain::{AgentConfig, AgentStatus, ResolvedAgent};
use crate::error::{Result, UpsellError};

/// Resolves the configuration a live run should use.
///
/// Implementations must never hand back a draft or testing configuration.
#[async_trait]
pub trait AgentResolver: Send + Sync {
    async fn get_active(&self, agent_id: &str) -> Result<ResolvedAgent>;
}

/// Registry of agent versions, optionally persisted as a JSON array.
#[derive(Debug)]
pub struct AgentRegistry {
    path: Option<PathBuf>,
    agents: RwLock<Vec<AgentConfig>>,
    fallback: Option<AgentConfig>,
}

impl AgentRegistry {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            agents: RwLock::new(Vec::new()),
            fallback: None,
        }
    }

    /// Open a file-backed registry. A missing file is an empty registry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let agents: Vec<AgentConfig> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Vec::new()
        };
        log::debug!("Opened agent registry {:?} with {} versions", path, agents.len());
        Ok(Self {
            path: Some(path),
            agents: RwLock::new(agents),
            fallback: None,
        })
    }

    /// Default used when no version is in production.
    pub fn with_fallback(mut self, fallback: AgentConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn list(&self) -> Result<Vec<AgentConfig>> {
        let agents = self.read()?;
        let mut list = agents.clone();
        list.sort_by(|a, b| {
            a.agent_id
                .cmp(&b.agent_id)
                .then_with(|| compare_versions(&a.version, &b.version))
        });
        Ok(list)
    }

    /// Add a new version. (agent_id, version) pairs are unique.
    pub fn register(&self, config: AgentConfig) -> Result<()> {
        config.validate()?;
        let mut agents = self.write()?;
        if agents
            .iter()
            .any(|a| a.agent_id == config.agent_id && a.version == config.version)
        {
            return Err(UpsellError::InvalidAgent(format!(
                "{} version {} is already registered",
                config.agent_id, config.version
            )));
        }

        let mut next = agents.clone();
        next.push(config.clone());
        self.persist(&next)?;
        *agents = next;

        log::info!(
            "Registered agent {} v{} ({}) status={}",
            config.agent_id,
            config.version,
            config.model,
            config.status
        );
        Ok(())
    }

    /// Mark a version production, demoting the current production version to testing.
    pub fn promote(&self, agent_id: &str, version: &str) -> Result<()> {
        let mut agents = self.write()?;
        if !agents.iter().any(|a| a.agent_id == agent_id && a.version == version) {
            return Err(UpsellError::InvalidAgent(format!(
                "{} version {} is not registered",
                agent_id, version
            )));
        }

        let now = Utc::now();
        let mut next = agents.clone();
        let mut demoted = Vec::new();
        for agent in next.iter_mut().filter(|a| a.agent_id == agent_id) {
            if agent.version == version {
                agent.status = AgentStatus::Production;
                agent.updated_at = now;
            } else if agent.status == AgentStatus::Production {
                agent.status = AgentStatus::Testing;
                agent.updated_at = now;
                demoted.push(agent.version.clone());
            }
        }
        self.persist(&next)?;
        *agents = next;

        for old in demoted {
            log::info!("Demoted {} v{} to testing", agent_id, old);
        }
        log::info!("Promoted {} v{} to production", agent_id, version);
        Ok(())
    }

    /// Highest production version for `agent_id`, if any.
    pub fn production(&self, agent_id: &str) -> Result<Option<AgentConfig>> {
        let agents = self.read()?;
        Ok(agents
            .iter()
            .filter(|a| a.agent_id == agent_id && a.is_live())
            .max_by(|a, b| compare_versions(&a.version, &b.version))
            .cloned())
    }

    pub fn save(&self) -> Result<()> {
        let agents = self.read()?;
        self.persist(&agents)
    }

    /// Write `agents` to the backing file. No-op for in-memory registries.
    fn persist(&self, agents: &[AgentConfig]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(agents)?)?;
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<AgentConfig>>> {
        self.agents
            .read()
            .map_err(|e| UpsellError::Storage(format!("agent registry lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<AgentConfig>>> {
        self.agents
            .write()
            .map_err(|e| UpsellError::Storage(format!("agent registry lock poisoned: {}", e)))
    }
}

#[async_trait]
impl AgentResolver for AgentRegistry {
    async fn get_active(&self, agent_id: &str) -> Result<ResolvedAgent> {
        if let Some(config) = self.production(agent_id)? {
            return Ok(ResolvedAgent::registry(config));
        }

        match &self.fallback {
            Some(fallback) => {
                log::warn!(
                    "No production configuration for agent '{}'; using fallback default v{}. Promote a version to close this gap.",
                    agent_id,
                    fallback.version
                );
                let mut config = fallback.clone();
                config.agent_id = agent_id.to_string();
                config.status = AgentStatus::Production;
                Ok(ResolvedAgent::fallback(config))
            }
            None => Err(UpsellError::ConfigUnavailable(format!(
                "no production configuration for agent '{}' and no fallback",
                agent_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigSource, FALLBACK_VERSION};
    use tempfile::TempDir;

    fn agent(version: &str, status: AgentStatus) -> AgentConfig {
        AgentConfig::new("upsell-generator", version, "claude-sonnet-4-20250514", status)
    }

    #[tokio::test]
    async fn test_get_active_picks_highest_production() {
        let registry = AgentRegistry::in_memory();
        registry.register(agent("1.2.0", AgentStatus::Production)).unwrap();
        registry.register(agent("1.10.0", AgentStatus::Production)).unwrap();
        registry.register(agent("2.0.0", AgentStatus::Testing)).unwrap();

        let active = registry.get_active("upsell-generator").await.unwrap();
        assert_eq!(active.config.version, "1.10.0");
        assert_eq!(active.source, ConfigSource::Registry);
    }

    #[tokio::test]
    async fn test_never_returns_draft_or_testing() {
        let registry = AgentRegistry::in_memory()
            .with_fallback(AgentConfig::fallback("upsell-generator", "claude-sonnet-4-20250514"));
        registry.register(agent("3.0.0", AgentStatus::Draft)).unwrap();
        registry.register(agent("2.0.0", AgentStatus::Testing)).unwrap();

        let active = registry.get_active("upsell-generator").await.unwrap();
        assert_eq!(active.source, ConfigSource::Fallback);
        assert_eq!(active.config.version, FALLBACK_VERSION);
        assert_eq!(active.config.status, AgentStatus::Production);
    }

    #[tokio::test]
    async fn test_no_fallback_is_config_unavailable() {
        let registry = AgentRegistry::in_memory();
        let err = registry.get_active("upsell-generator").await.unwrap_err();
        assert!(matches!(err, UpsellError::ConfigUnavailable(_)));
    }

    #[tokio::test]
    async fn test_promote_demotes_previous() {
        let registry = AgentRegistry::in_memory();
        registry.register(agent("1.0.0", AgentStatus::Production)).unwrap();
        registry.register(agent("1.1.0", AgentStatus::Testing)).unwrap();

        registry.promote("upsell-generator", "1.1.0").unwrap();

        let list = registry.list().unwrap();
        assert_eq!(list[0].version, "1.0.0");
        assert_eq!(list[0].status, AgentStatus::Testing);
        assert_eq!(list[1].status, AgentStatus::Production);
        let active = registry.get_active("upsell-generator").await.unwrap();
        assert_eq!(active.config.version, "1.1.0");
    }

    #[test]
    fn test_promote_unknown_version() {
        let registry = AgentRegistry::in_memory();
        assert!(matches!(
            registry.promote("upsell-generator", "9.9.9"),
            Err(UpsellError::InvalidAgent(_))
        ));
    }

    #[test]
    fn test_register_rejects_duplicates_and_invalid() {
        let registry = AgentRegistry::in_memory();
        registry.register(agent("1.0.0", AgentStatus::Draft)).unwrap();
        assert!(registry.register(agent("1.0.0", AgentStatus::Draft)).is_err());
        assert!(registry.register(agent("one", AgentStatus::Draft)).is_err());
    }

    #[tokio::test]
    async fn test_file_backed_registry_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agents.json");
        {
            let registry = AgentRegistry::open(&path).unwrap();
            registry.register(agent("1.0.0", AgentStatus::Testing)).unwrap();
            registry.promote("upsell-generator", "1.0.0").unwrap();
        }
        let reopened = AgentRegistry::open(&path).unwrap();
        let active = reopened.get_active("upsell-generator").await.unwrap();
        assert_eq!(active.config.version, "1.0.0");
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("agents.json");
        let registry = AgentRegistry::open(&good).unwrap();
        registry.register(agent("1.0.0", AgentStatus::Production)).unwrap();
        registry.register(agent("1.1.0", AgentStatus::Testing)).unwrap();

        // Parent of the target path is a regular file, so every write fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let broken = AgentRegistry {
            path: Some(blocker.join("agents.json")),
            agents: RwLock::new(registry.list().unwrap()),
            fallback: None,
        };

        assert!(broken.register(agent("2.0.0", AgentStatus::Testing)).is_err());
        assert!(broken.promote("upsell-generator", "1.1.0").is_err());

        let versions: Vec<_> = broken
            .list()
            .unwrap()
            .into_iter()
            .map(|a| (a.version, a.status))
            .collect();
        assert_eq!(
            versions,
            vec![
                ("1.0.0".to_string(), AgentStatus::Production),
                ("1.1.0".to_string(), AgentStatus::Testing),
            ]
        );
    }
}
