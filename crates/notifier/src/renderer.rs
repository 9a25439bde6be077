//! Notification body rendering

use anyhow::{bail, Context, Result};
use handlebars::Handlebars;
use std::path::PathBuf;
use tracing::debug;

/// Renders a named template against a JSON context
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String>;
}

/// Handlebars templates read from a directory on disk
pub struct TemplateRenderer {
    dir: PathBuf,
    reg: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut reg = Handlebars::new();
        // Output is a plain text email
        reg.register_escape_fn(handlebars::no_escape);

        Self {
            dir: dir.into(),
            reg,
        }
    }

    /// Read and compile `name` from the templates directory
    pub fn load(&mut self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        if !path.is_file() {
            bail!("Template could not be found: {}", path.display());
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("reading template {}", path.display()))?;
        self.reg
            .register_template_string(name, source)
            .with_context(|| format!("registering template {}", name))?;

        debug!("Loaded template {} from {}", name, path.display());
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.reg.has_template(name)
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String> {
        self.reg
            .render(template, context)
            .with_context(|| format!("rendering template {}", template))
    }
}
