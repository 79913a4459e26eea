//! Prompt Renderer - Render templates with context variables using Handlebars
//!
//! Templates are registered by name. The built-in generator and judge
//! templates are always present; extra generator templates can be loaded
//! from a directory and selected per agent version.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use super::loader::PromptLoader;
use super::templates::{DEFAULT_GENERATOR_TEMPLATE, GENERATOR_TEMPLATE, JUDGE_TEMPLATE, JUDGE_TEMPLATE_NAME};
use crate::error::{Result, UpsellError};

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a renderer with only the built-in templates
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut renderer = Self { handlebars };
        for (name, template) in [
            (DEFAULT_GENERATOR_TEMPLATE, GENERATOR_TEMPLATE),
            (JUDGE_TEMPLATE_NAME, JUDGE_TEMPLATE),
        ] {
            if let Err(e) = renderer.register_template(name, template) {
                log::error!("Built-in template '{}' failed to register: {}", name, e);
            }
        }
        renderer
    }

    /// Create a renderer and register every `*.hbs` file found in `dir`
    pub fn with_templates_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut renderer = Self::new();
        let loader = PromptLoader::new(dir);
        for (name, template) in loader.load_all()? {
            renderer.register_template(&name, &template)?;
            log::debug!("Registered prompt template '{}'", name);
        }
        Ok(renderer)
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| UpsellError::Template(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a previously registered template with any serializable context
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| UpsellError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| UpsellError::Template(format!("Failed to render template: {}", e)))
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }

    /// Resolve an agent's template reference, falling back to the built-in one
    pub fn generator_template<'a>(&self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(name) if self.has_template(name) => name,
            Some(name) => {
                log::warn!(
                    "Prompt template '{}' is not registered, using '{}'",
                    name,
                    DEFAULT_GENERATOR_TEMPLATE
                );
                DEFAULT_GENERATOR_TEMPLATE
            }
            None => DEFAULT_GENERATOR_TEMPLATE,
        }
    }
}
