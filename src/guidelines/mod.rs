//! Brand rules and service catalog, loaded together from one guidelines file.

pub mod brand;
pub mod catalog;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use brand::BrandRules;
pub use catalog::{Service, ServiceCatalog};

use crate::error::Result;

/// On-disk guidelines document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guidelines {
    #[serde(flatten)]
    pub brand: BrandRules,
    #[serde(default = "ServiceCatalog::builtin")]
    pub service_catalog: ServiceCatalog,
}

impl Default for Guidelines {
    fn default() -> Self {
        Self {
            brand: BrandRules::default(),
            service_catalog: ServiceCatalog::builtin(),
        }
    }
}

impl Guidelines {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let guidelines: Guidelines = serde_json::from_str(&content)?;
        log::debug!(
            "Loaded guidelines from {:?}: {} services",
            path,
            guidelines.service_catalog.len()
        );
        Ok(guidelines)
    }

    /// Load from `path` when it exists, otherwise use the built-in guidelines.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                log::info!("Guidelines file {:?} not found, using built-in guidelines", p);
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_guidelines_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guidelines.json");
        std::fs::write(
            &path,
            r#"{
                "brand_voice": "Friendly",
                "tone": "Warm",
                "key_messages": ["reliability", "expertise"],
                "avoid": ["aggressive sales"],
                "service_catalog": [
                    {"name": "Mosquito Treatment", "description": "Monthly yard spray"}
                ]
            }"#,
        )
        .unwrap();

        let g = Guidelines::load(&path).unwrap();
        assert_eq!(g.brand.brand_voice, "Friendly");
        assert_eq!(g.brand.avoid, vec!["aggressive sales".to_string()]);
        assert_eq!(g.service_catalog.len(), 1);
    }

    #[test]
    fn test_missing_catalog_uses_builtin() {
        let g: Guidelines = serde_json::from_str(r#"{"brand_voice": "Calm"}"#).unwrap();
        assert_eq!(g.service_catalog, ServiceCatalog::builtin());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let g = Guidelines::load_or_default(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(g, Guidelines::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        assert!(Guidelines::load(&path).is_err());
    }
}
