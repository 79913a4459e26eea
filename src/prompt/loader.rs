//! Prompt Loader - Load prompt templates from a directory
//!
//! Every `*.hbs` file in the directory becomes a template named after its
//! file stem, so `seasonal-v2.hbs` is referenced as `seasonal-v2`.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Template file extension
const TEMPLATE_EXT: &str = "hbs";

/// Loads prompt templates from a directory
pub struct PromptLoader {
    templates_dir: PathBuf,
}

impl PromptLoader {
    pub fn new(templates_dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: templates_dir.as_ref().to_path_buf(),
        }
    }

    /// Load a single template by name
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.template_path(name);
        std::fs::read_to_string(&path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to load template '{}' from {:?}: {}", name, path, e),
            )
            .into()
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.template_path(name).exists()
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir.join(format!("{}.{}", name, TEMPLATE_EXT))
    }

    /// List template names in the directory, sorted. A missing directory is empty.
    pub fn list_available(&self) -> Result<Vec<String>> {
        if !self.templates_dir.exists() {
            return Ok(Vec::new());
        }

        let mut templates = Vec::new();
        for entry in std::fs::read_dir(&self.templates_dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TEMPLATE_EXT)
                && let Some(stem) = path.file_stem()
                && let Some(name) = stem.to_str()
            {
                templates.push(name.to_string());
            }
        }

        templates.sort();
        Ok(templates)
    }

    /// Load every available template as (name, content) pairs
    pub fn load_all(&self) -> Result<Vec<(String, String)>> {
        self.list_available()?
            .into_iter()
            .map(|name| {
                let content = self.load(&name)?;
                Ok((name, content))
            })
            .collect()
    }
}
