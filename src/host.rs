//! Host build-system boundary.
//!
//! The plugin only needs four capabilities from the system that renders
//! pages, captured by [`Host`]. [`Pipeline`] is a small in-memory host that
//! drives them directly: start a build, evaluate shortcodes while authoring,
//! run transforms over rendered pages, end the build.

use crate::outline::Page;
use anyhow::{Result, bail};
use futures::future::BoxFuture;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Build lifecycle events a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildEvent {
    Start,
    End,
}

pub type Hook = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Text filter, e.g. the host's `slugify`.
pub type Filter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Authoring-time shortcode: returns the text to embed in place.
pub type TokenProducer = Arc<dyn Fn(&Page, &[String]) -> Result<String> + Send + Sync>;

/// Post-render transform over a page's full output.
pub type ContentTransform =
    Arc<dyn Fn(Page, String) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Capabilities a host build system offers to plugins.
pub trait Host {
    fn on(&mut self, event: BuildEvent, hook: Hook);

    fn add_token_producer(&mut self, name: &str, producer: TokenProducer);

    fn add_transform(&mut self, name: &str, transform: ContentTransform);

    fn filter(&self, name: &str) -> Option<Filter>;
}

// ============================================================================
// In-memory host
// ============================================================================

/// Minimal host that runs hooks, shortcodes and transforms on request.
#[derive(Default)]
pub struct Pipeline {
    hooks: Vec<(BuildEvent, Hook)>,
    producers: FxHashMap<String, TokenProducer>,
    transforms: Vec<(String, ContentTransform)>,
    filters: FxHashMap<String, Filter>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a filter available to plugins through [`Host::filter`].
    pub fn add_filter(&mut self, name: &str, filter: Filter) {
        self.filters.insert(name.to_owned(), filter);
    }

    pub fn start_build(&self) -> Result<()> {
        self.emit(BuildEvent::Start)
    }

    pub fn end_build(&self) -> Result<()> {
        self.emit(BuildEvent::End)
    }

    /// Evaluate shortcode `name` for `page`.
    pub fn shortcode(&self, name: &str, page: &Page, args: &[String]) -> Result<String> {
        match self.producers.get(name) {
            Some(producer) => producer(page, args),
            None => bail!("unknown shortcode `{name}`"),
        }
    }

    /// Run every transform over a rendered page, in registration order.
    pub async fn render_page(&self, page: &Page, content: String) -> Result<String> {
        let mut content = content;
        for (_, transform) in &self.transforms {
            content = transform(page.clone(), content).await?;
        }
        Ok(content)
    }

    /// Names of the registered transforms, in registration order.
    pub fn transforms(&self) -> impl Iterator<Item = &str> {
        self.transforms.iter().map(|(name, _)| name.as_str())
    }

    fn emit(&self, event: BuildEvent) -> Result<()> {
        self.hooks
            .iter()
            .filter(|(on, _)| *on == event)
            .try_for_each(|(_, hook)| hook())
    }
}

impl Host for Pipeline {
    fn on(&mut self, event: BuildEvent, hook: Hook) {
        self.hooks.push((event, hook));
    }

    fn add_token_producer(&mut self, name: &str, producer: TokenProducer) {
        self.producers.insert(name.to_owned(), producer);
    }

    fn add_transform(&mut self, name: &str, transform: ContentTransform) {
        self.transforms.push((name.to_owned(), transform));
    }

    fn filter(&self, name: &str) -> Option<Filter> {
        self.filters.get(name).cloned()
    }
}
