//! Renders alert templates with minijinja and the alert filters.

use minijinja::Environment;
use thiserror::Error;

pub mod filters;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// Rendering failed.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl TemplateService {
    /// Creates an environment with strict undefined handling and the alert
    /// filters registered. Nothing is auto-escaped: callers pass values that
    /// are already HTML-safe.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_filter("market_cap", filters::market_cap);
        env.add_filter("price", filters::price);
        env.add_filter("usd", filters::usd);
        env.add_filter("short_address", filters::short_address);
        env.add_filter("emoji_bar", filters::emoji_bar);

        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        match self.env.render_str(template_str, context) {
            Ok(rendered_string) => Ok(rendered_string),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to render alert template.");
                Err(TemplateServiceError::RenderError(e))
            }
        }
    }
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}
