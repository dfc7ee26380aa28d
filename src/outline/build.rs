//! Build-scoped outline state.

use super::engine::{RenderError, TemplateEngine};
use super::registry::Registry;
use super::template::TemplateRenderer;
use crate::log;
use std::path::PathBuf;
use std::sync::Arc;

/// State shared by authoring and resolution during one build.
///
/// A new context is created when a build starts, which is what clears the
/// registry between builds. Materialised templates are released by
/// [`BuildContext::finish`] when the build ends.
pub struct BuildContext {
    registry: Registry,
    renderer: TemplateRenderer,
    verbose: bool,
}

impl BuildContext {
    pub fn new(engine: Arc<dyn TemplateEngine>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: Registry::new(),
            renderer: TemplateRenderer::new(engine, tmp_dir),
            verbose: false,
        }
    }

    /// Log template cleanup when the build finishes.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Remove temporary templates written during this build.
    pub fn finish(&self) -> Result<usize, RenderError> {
        let removed = self.renderer.cleanup()?;
        if self.verbose && removed > 0 {
            log!("outline"; "removed {} temporary template(s)", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlugMode;
    use crate::outline::{JinjaEngine, Mode, OutlineData, Page, TemplateSpec};
    use crate::slug::slugifier;

    #[test]
    fn test_quiet_unless_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(JinjaEngine::new(slugifier(SlugMode::On)));

        let quiet = BuildContext::new(engine.clone(), dir.path().join("a"));
        assert!(!quiet.is_verbose());
        assert_eq!(quiet.finish().unwrap(), 0);

        let verbose = BuildContext::new(engine, dir.path().join("b")).with_verbose(true);
        assert!(verbose.is_verbose());
        assert_eq!(verbose.finish().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_finish_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        let engine = Arc::new(JinjaEngine::new(slugifier(SlugMode::On)));
        let build = BuildContext::new(engine, &tmp);

        let page = Page::new("/", "public/index.html");
        build.registry().register(
            page.clone(),
            "h2",
            Mode::OptIn,
            TemplateSpec::path("toc.jinja"),
        );
        let data = OutlineData {
            headers: Vec::new(),
            page,
        };
        build
            .renderer()
            .render(&TemplateSpec::inline("jinja", "ok"), &data)
            .await
            .unwrap();

        assert!(tmp.exists());
        assert_eq!(build.finish().unwrap(), 1);
        assert!(!tmp.exists());
        assert_eq!(build.registry().len(), 1);
    }
}
