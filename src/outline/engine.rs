//! Template engine abstraction.
//!
//! Outline markup is produced by a [`TemplateEngine`] that renders a template
//! file with [`OutlineData`]. The default implementation is [`JinjaEngine`].

use super::OutlineData;
use crate::slug::Slugify;
use async_trait::async_trait;
use minijinja::Environment;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Template languages [`JinjaEngine`] renders.
pub const JINJA_LANGUAGES: &[&str] = &["jinja", "j2", "html"];

/// Errors raised while rendering outline templates.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported template language `{lang}`")]
    UnsupportedLanguage { lang: String },

    #[error("IO error when accessing `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to render template `{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error(transparent)]
    Engine(Box<dyn std::error::Error + Send + Sync>),
}

/// A template engine that renders template files with outline data.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Whether templates written in `lang` can be rendered.
    fn supports(&self, lang: &str) -> bool;

    /// Render the template at `path`.
    async fn render_file(&self, path: &Path, data: &OutlineData) -> Result<String, RenderError>;
}

/// MiniJinja-based template engine.
///
/// Besides the MiniJinja built-ins, registers the liquid-style filters
/// `downcase` and `upcase`, and `slugify` bound to the configured slug
/// function.
pub struct JinjaEngine {
    env: Environment<'static>,
}

impl JinjaEngine {
    pub fn new(slugify: Slugify) -> Self {
        let mut env = Environment::new();
        env.add_filter("downcase", |value: String| value.to_lowercase());
        env.add_filter("upcase", |value: String| value.to_uppercase());
        env.add_filter("slugify", move |value: String| slugify(&value));
        Self { env }
    }

    /// Underlying environment, for registering extra filters or functions.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// Render template source directly.
    pub fn render_source(
        &self,
        name: &str,
        source: &str,
        data: &OutlineData,
    ) -> Result<String, RenderError> {
        self.env
            .render_named_str(name, source, data)
            .map_err(|source| RenderError::Template {
                name: name.to_owned(),
                source,
            })
    }
}

#[async_trait]
impl TemplateEngine for JinjaEngine {
    fn supports(&self, lang: &str) -> bool {
        JINJA_LANGUAGES.contains(&lang.to_ascii_lowercase().as_str())
    }

    async fn render_file(&self, path: &Path, data: &OutlineData) -> Result<String, RenderError> {
        let lang = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !self.supports(lang) {
            return Err(RenderError::UnsupportedLanguage {
                lang: lang.to_owned(),
            });
        }

        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| RenderError::Io(path.to_path_buf(), err))?;
        self.render_source(&path.display().to_string(), &source, data)
    }
}
