//! Outline plugin.
//!
//! Wires the outline pipeline into a [`Host`]:
//!
//! | Host capability   | Name               | Action                          |
//! |-------------------|--------------------|---------------------------------|
//! | build start hook  |                    | fresh registry and template cache |
//! | build end hook    |                    | remove temporary templates      |
//! | token producer    | `outline`          | register a request, emit token  |
//! | content transform | `document-outline` | resolve tokens in rendered page |

use crate::config::{OutlineConfig, ReplaceMode, SlugConfig};
use crate::error::OutlineError;
use crate::host::{BuildEvent, Host};
use crate::html::Document;
use crate::outline::{
    BuildContext, HeaderRecord, JinjaEngine, Mode, OutlineData, Page, RenderError,
    ResolveOptions, TemplateEngine, TemplateSpec, Token, extract, resolve,
};
use crate::slug::{SlugSet, Slugify, slugifier};
use anyhow::{Result, bail};
use arc_swap::ArcSwap;
use educe::Educe;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the authoring-time token producer.
pub const SHORTCODE: &str = "outline";
/// Name of the content transform.
pub const TRANSFORM: &str = "document-outline";

/// Runtime options: the loaded config plus what TOML cannot express.
#[derive(Clone, Educe)]
#[educe(Debug)]
pub struct OutlineOptions {
    pub headers: String,
    pub template: TemplateSpec,
    pub mode: Mode,
    /// Resolved directory for materialised inline templates.
    pub tmp_dir: PathBuf,
    pub replace: ReplaceMode,
    pub verbose: bool,
    pub slug: SlugConfig,
    /// Overrides both the host's `slugify` filter and `slug.mode`.
    #[educe(Debug(ignore))]
    pub slugify: Option<Slugify>,
}

impl OutlineOptions {
    /// Build options from `config`, resolving `tmp_dir` against `root`.
    pub fn from_config(config: OutlineConfig, root: &Path) -> Self {
        let tmp_dir = config.tmp_dir_in(root);
        Self {
            headers: config.headers,
            template: config.template,
            mode: config.mode,
            tmp_dir,
            replace: config.replace,
            verbose: config.verbose,
            slug: config.slug,
            slugify: None,
        }
    }

    /// Load and validate a config file; relative paths resolve against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let config = OutlineConfig::from_path(path)?;
        config.validate()?;
        let root = path.parent().unwrap_or(Path::new(""));
        Ok(Self::from_config(config, root))
    }

    pub fn with_slugify(mut self, slugify: Slugify) -> Self {
        self.slugify = Some(slugify);
        self
    }
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self::from_config(OutlineConfig::default(), Path::new(""))
    }
}

/// Per-call overrides; unset fields fall back to [`OutlineOptions`].
#[derive(Debug, Clone, Default)]
pub struct OutlineArgs {
    pub selector: Option<String>,
    pub template: Option<TemplateSpec>,
    pub mode: Option<Mode>,
}

impl OutlineArgs {
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn template(mut self, template: TemplateSpec) -> Self {
        self.template = Some(template);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Positional shortcode arguments: `selector`, `template` path, `mode`.
    ///
    /// Empty arguments keep the configured default.
    pub fn from_shortcode(args: &[String]) -> Result<Self> {
        if args.len() > 3 {
            bail!(
                "`{SHORTCODE}` takes at most 3 arguments (selector, template, mode), got {}",
                args.len()
            );
        }
        let arg = |index: usize| {
            args.get(index)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let mode = match arg(2) {
            Some(mode) => Some(mode.parse::<Mode>().map_err(anyhow::Error::msg)?),
            None => None,
        };
        Ok(Self {
            selector: arg(0).map(str::to_owned),
            template: arg(1).map(TemplateSpec::path),
            mode,
        })
    }
}

/// Headers extracted from content that is already available.
#[derive(Debug, Clone)]
pub struct ParsedOutline {
    /// The input, re-serialised only when ids were added.
    pub content: String,
    pub headers: Vec<HeaderRecord>,
}

/// The outline plugin: authoring-time tokens resolved after rendering.
pub struct DocumentOutline {
    options: OutlineOptions,
    resolve: ResolveOptions,
    engine: Arc<dyn TemplateEngine>,
    build: ArcSwap<BuildContext>,
}

impl DocumentOutline {
    /// Plugin rendering with [`JinjaEngine`].
    pub fn new(options: OutlineOptions) -> Self {
        let slugify = Self::slugify_for(&options);
        let engine = Arc::new(JinjaEngine::new(slugify));
        Self::with_engine(options, engine)
    }

    pub fn with_engine(options: OutlineOptions, engine: Arc<dyn TemplateEngine>) -> Self {
        let resolve = ResolveOptions {
            slugify: Self::slugify_for(&options),
            dedupe: options.slug.dedupe,
            replace: options.replace,
            verbose: options.verbose,
        };
        let build = BuildContext::new(engine.clone(), &options.tmp_dir).with_verbose(options.verbose);
        Self {
            options,
            resolve,
            engine,
            build: ArcSwap::from_pointee(build),
        }
    }

    fn slugify_for(options: &OutlineOptions) -> Slugify {
        options
            .slugify
            .clone()
            .unwrap_or_else(|| slugifier(options.slug.mode))
    }

    /// Create the plugin and register it with `host`.
    ///
    /// Without a `slugify` override, the host's `slugify` filter is used when
    /// it has one, else `slug.mode`.
    pub fn install<H: Host + ?Sized>(host: &mut H, mut options: OutlineOptions) -> Arc<Self> {
        if options.slugify.is_none() {
            options.slugify = host.filter("slugify");
        }
        let plugin = Arc::new(Self::new(options));

        let this = plugin.clone();
        host.on(
            BuildEvent::Start,
            Arc::new(move || -> Result<()> {
                this.begin_build()?;
                Ok(())
            }),
        );

        let this = plugin.clone();
        host.on(
            BuildEvent::End,
            Arc::new(move || -> Result<()> {
                this.end_build()?;
                Ok(())
            }),
        );

        let this = plugin.clone();
        host.add_token_producer(
            SHORTCODE,
            Arc::new(move |page: &Page, args: &[String]| -> Result<String> {
                let args = OutlineArgs::from_shortcode(args)?;
                Ok(this.outline(page, args).to_string())
            }),
        );

        let this = plugin.clone();
        host.add_transform(
            TRANSFORM,
            Arc::new(move |page: Page, content: String| {
                let this = this.clone();
                async move {
                    this.transform(&page, &content)
                        .await
                        .map_err(anyhow::Error::from)
                }
                .boxed()
            }),
        );

        plugin
    }

    pub fn options(&self) -> &OutlineOptions {
        &self.options
    }

    /// Context of the current build.
    pub fn build(&self) -> Arc<BuildContext> {
        self.build.load_full()
    }

    /// Start a build with an empty registry.
    ///
    /// Templates left over from a build that never ended are removed.
    pub fn begin_build(&self) -> Result<(), RenderError> {
        let fresh = BuildContext::new(self.engine.clone(), &self.options.tmp_dir)
            .with_verbose(self.options.verbose);
        self.build.swap(Arc::new(fresh)).finish()?;
        Ok(())
    }

    /// Remove the temporary templates of the current build.
    pub fn end_build(&self) -> Result<usize, RenderError> {
        self.build.load().finish()
    }

    /// Register an outline request for `page` and return its token.
    pub fn outline(&self, page: &Page, args: OutlineArgs) -> Token {
        let OutlineArgs {
            selector,
            template,
            mode,
        } = args;
        self.build.load().registry().register(
            page.clone(),
            selector.unwrap_or_else(|| self.options.headers.clone()),
            mode.unwrap_or(self.options.mode),
            template.unwrap_or_else(|| self.options.template.clone()),
        )
    }

    /// Resolve the outline tokens in a rendered page.
    pub async fn transform(&self, page: &Page, content: &str) -> Result<String, OutlineError> {
        let build = self.build();
        resolve(&build, &self.resolve, page, content).await
    }

    /// Extract headers from `content` right away.
    pub fn parse(
        &self,
        content: &str,
        selector: Option<&str>,
        mode: Option<Mode>,
    ) -> Result<ParsedOutline, OutlineError> {
        let mut doc = Document::parse(content)?;
        let mut slugs = self
            .resolve
            .dedupe
            .then(|| SlugSet::with_existing(doc.ids().map(str::to_owned).collect::<Vec<_>>()));
        let extraction = extract(
            &mut doc,
            selector.unwrap_or(&self.options.headers),
            mode.unwrap_or(self.options.mode),
            &self.resolve.slugify,
            slugs.as_mut(),
        )?;

        let content = if extraction.modified {
            doc.serialize()?
        } else {
            content.to_owned()
        };
        Ok(ParsedOutline {
            content,
            headers: extraction.headers,
        })
    }

    /// Render an outline of `content` right away, listing only headers that
    /// already have an id.
    pub async fn render(
        &self,
        page: &Page,
        content: &str,
        selector: Option<&str>,
        template: Option<&TemplateSpec>,
    ) -> Result<String, OutlineError> {
        let parsed = self.parse(content, selector, Some(Mode::OptIn))?;
        let data = OutlineData {
            headers: parsed.headers,
            page: page.clone(),
        };
        let template = template.unwrap_or(&self.options.template);
        let build = self.build();
        Ok(build.renderer().render(template, &data).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlugMode;
    use crate::host::Pipeline;
    use tempfile::TempDir;

    const CONTENT: &str = r#"<h2>Intro</h2><h3 id="x">Sub</h3>"#;

    fn options(dir: &TempDir) -> OutlineOptions {
        OutlineOptions {
            tmp_dir: dir.path().join("tmp"),
            ..OutlineOptions::default()
        }
    }

    fn page() -> Page {
        Page::new("/guide/", "public/guide/index.html").with_input("content/guide.md")
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_outline_uses_configured_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = DocumentOutline::new(options(&dir));

        let token = plugin.outline(&page(), OutlineArgs::default());
        let request = plugin.build().registry().lookup(token.as_str()).unwrap();
        assert_eq!(request.selector, "h1,h2,h3");
        assert_eq!(request.mode, Mode::OptIn);
        assert_eq!(request.page, page());

        let token = plugin.outline(&page(), OutlineArgs::default().selector("h2").mode(Mode::Dynamic));
        let request = plugin.build().registry().lookup(token.as_str()).unwrap();
        assert_eq!(request.selector, "h2");
        assert_eq!(request.mode, Mode::Dynamic);
    }

    #[test]
    fn test_build_context_follows_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = DocumentOutline::new(options(&dir));
        assert!(!plugin.build().is_verbose());
        plugin.begin_build().unwrap();
        assert!(!plugin.build().is_verbose());

        let plugin = DocumentOutline::new(OutlineOptions {
            verbose: true,
            ..options(&dir)
        });
        assert!(plugin.build().is_verbose());
        plugin.begin_build().unwrap();
        assert!(plugin.build().is_verbose());
    }

    #[test]
    fn test_shortcode_args() {
        let parsed = OutlineArgs::from_shortcode(&args(&["h2", "toc.html", "dynamic"])).unwrap();
        assert_eq!(parsed.selector.as_deref(), Some("h2"));
        assert!(matches!(parsed.template, Some(TemplateSpec::Path(ref p)) if p == Path::new("toc.html")));
        assert_eq!(parsed.mode, Some(Mode::Dynamic));

        let parsed = OutlineArgs::from_shortcode(&args(&["", "", "optin"])).unwrap();
        assert!(parsed.selector.is_none());
        assert!(parsed.template.is_none());

        assert!(OutlineArgs::from_shortcode(&args(&["h2", "", "eager"])).is_err());
        assert!(OutlineArgs::from_shortcode(&args(&["a", "b", "c", "d"])).is_err());
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        let mut pipeline = Pipeline::new();
        DocumentOutline::install(&mut pipeline, options(&dir));
        assert_eq!(pipeline.transforms().collect::<Vec<_>>(), vec![TRANSFORM]);

        pipeline.start_build().unwrap();
        let token = pipeline
            .shortcode(SHORTCODE, &page(), &args(&["h2,h3", "", "dynamic"]))
            .unwrap();
        let rendered = format!("<nav>{token}</nav>{CONTENT}");

        let out = pipeline.render_page(&page(), rendered).await.unwrap();
        assert_eq!(
            out,
            concat!(
                r##"<nav><a href="#intro" class="link-h2">Intro</a><a href="#x" class="link-h3">Sub</a></nav>"##,
                r#"<h2 id="intro">Intro</h2><h3 id="x">Sub</h3>"#,
            )
        );
        assert!(tmp.exists());

        pipeline.end_build().unwrap();
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn test_previous_build_tokens_stay_literal() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        DocumentOutline::install(&mut pipeline, options(&dir));

        pipeline.start_build().unwrap();
        let stale = pipeline.shortcode(SHORTCODE, &page(), &[]).unwrap();
        pipeline.end_build().unwrap();

        pipeline.start_build().unwrap();
        let rendered = format!("<nav>{stale}</nav>{CONTENT}");
        let out = pipeline.render_page(&page(), rendered.clone()).await.unwrap();
        assert_eq!(out, rendered);
    }

    #[test]
    fn test_host_slugify_filter_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.add_filter("slugify", Arc::new(|text: &str| format!("h-{}", text.to_lowercase())));
        let plugin = DocumentOutline::install(&mut pipeline, options(&dir));

        let parsed = plugin.parse(CONTENT, None, Some(Mode::Dynamic)).unwrap();
        assert_eq!(parsed.headers[0].id, "h-intro");
    }

    #[test]
    fn test_slugify_override_beats_host_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.add_filter("slugify", Arc::new(|text: &str| format!("h-{text}")));
        let options = options(&dir).with_slugify(Arc::new(|text: &str| text.to_uppercase()));
        let plugin = DocumentOutline::install(&mut pipeline, options);

        let parsed = plugin.parse(CONTENT, None, Some(Mode::Dynamic)).unwrap();
        assert_eq!(parsed.headers[0].id, "INTRO");
    }

    #[test]
    fn test_slug_mode_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(&dir);
        options.slug.mode = SlugMode::No;
        let plugin = DocumentOutline::new(options);

        let parsed = plugin
            .parse("<h2>Hello World</h2>", Some("h2"), Some(Mode::Dynamic))
            .unwrap();
        assert_eq!(parsed.headers[0].id, "Hello World");
    }

    #[test]
    fn test_parse_reserializes_only_when_modified() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = DocumentOutline::new(options(&dir));

        let parsed = plugin.parse(CONTENT, Some("h2,h3"), None).unwrap();
        assert_eq!(parsed.content, CONTENT);
        assert_eq!(parsed.headers.len(), 1);

        let parsed = plugin.parse(CONTENT, Some("h2,h3"), Some(Mode::Dynamic)).unwrap();
        assert_eq!(parsed.content, r#"<h2 id="intro">Intro</h2><h3 id="x">Sub</h3>"#);
        assert_eq!(parsed.headers.len(), 2);
    }

    #[tokio::test]
    async fn test_render_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = DocumentOutline::new(options(&dir));

        let out = plugin.render(&page(), CONTENT, None, None).await.unwrap();
        assert_eq!(out, r##"<a href="#x" class="link-h3">Sub</a>"##);

        let template = TemplateSpec::inline("jinja", "{{ headers | length }} in {{ page.url }}");
        let out = plugin
            .render(&page(), CONTENT, Some("h3"), Some(&template))
            .await
            .unwrap();
        assert_eq!(out, "1 in /guide/");
    }

    #[tokio::test]
    async fn test_failure_names_source_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        DocumentOutline::install(&mut pipeline, options(&dir));

        pipeline.start_build().unwrap();
        let token = pipeline
            .shortcode(SHORTCODE, &page(), &args(&["h2[["]))
            .unwrap();
        let err = pipeline
            .render_page(&page(), format!("{token}{CONTENT}"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content/guide.md"));
        assert!(err.to_string().contains("invalid selector"));
    }

    #[test]
    fn test_load_resolves_tmp_dir_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outline.toml");
        std::fs::write(&path, "headers = \"h2\"\nmode = \"dynamic\"\n[slug]\ndedupe = true\n").unwrap();

        let options = OutlineOptions::load(&path).unwrap();
        assert_eq!(options.headers, "h2");
        assert_eq!(options.mode, Mode::Dynamic);
        assert!(options.slug.dedupe);
        assert_eq!(options.tmp_dir, dir.path().join(".outline-templates"));
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outline.toml");
        std::fs::write(&path, "headers = \"h2[\"\n").unwrap();
        assert!(OutlineOptions::load(&path).is_err());
    }
}
