//! Resolution transform.
//!
//! Runs once per rendered page and swaps outline tokens for rendered
//! outlines.
//!
//! ```text
//! content ──► html? ──► tokens? ──► parse once ──► extract per request
//!               │          │                            │
//!               no         no                           ▼
//!               │          │                  render all (concurrently)
//!               ▼          ▼                            │
//!            content    content                         ▼
//!                                    serialize if ids were added, substitute
//! ```
//!
//! Extraction runs sequentially on the shared document since dynamic mode
//! writes ids into it. Rendering only reads the extracted headers and is
//! joined before substitution, so a failure leaves no partial output.

use super::build::BuildContext;
use super::header::extract;
use super::registry::{OutlineRequest, TokenMatcher};
use super::{HeaderRecord, OutlineData, Page};
use crate::config::ReplaceMode;
use crate::error::OutlineError;
use crate::html::Document;
use crate::log;
use crate::slug::{SlugSet, Slugify};
use futures::future::try_join_all;
use regex::Captures;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Page-independent settings for [`resolve`].
#[derive(Clone)]
pub struct ResolveOptions {
    pub slugify: Slugify,
    /// Suffix colliding dynamic ids with `-1`, `-2`, ...
    pub dedupe: bool,
    pub replace: ReplaceMode,
    /// Log one line per page that contained outlines.
    pub verbose: bool,
}

impl ResolveOptions {
    pub fn new(slugify: Slugify) -> Self {
        Self {
            slugify,
            dedupe: false,
            replace: ReplaceMode::default(),
            verbose: false,
        }
    }
}

/// Replace the outline tokens in `content` with rendered outlines.
///
/// Returns `content` unchanged when `page` is not HTML or carries no token
/// registered in `build`.
pub async fn resolve(
    build: &BuildContext,
    options: &ResolveOptions,
    page: &Page,
    content: &str,
) -> Result<String, OutlineError> {
    if !page.is_html() {
        return Ok(content.to_owned());
    }

    let requests = build.registry().find_in(content)?;
    if requests.is_empty() {
        return Ok(content.to_owned());
    }

    let mut doc = Document::parse(content)?;
    let mut slugs = options
        .dedupe
        .then(|| SlugSet::with_existing(doc.ids().map(str::to_owned).collect::<Vec<_>>()));

    let mut modified = false;
    let mut jobs = Vec::with_capacity(requests.len());
    for request in requests {
        let extraction = extract(
            &mut doc,
            &request.selector,
            request.mode,
            &options.slugify,
            slugs.as_mut(),
        )
        .map_err(|err| OutlineError::from(err).in_page(request.page.origin()))?;
        modified |= extraction.modified;
        jobs.push((request, extraction.headers));
    }

    let rendered = try_join_all(
        jobs.into_iter()
            .map(|(request, headers)| render(build, request, headers)),
    )
    .await?;

    let base = if modified {
        doc.serialize()?
    } else {
        content.to_owned()
    };

    if options.verbose {
        log!("outline"; "{}: resolved {} outline(s)", page.url, rendered.len());
    }

    let outlines: FxHashMap<_, _> = rendered.into_iter().collect();
    substitute(&base, &outlines, options.replace)
}

async fn render(
    build: &BuildContext,
    request: Arc<OutlineRequest>,
    headers: Vec<HeaderRecord>,
) -> Result<(String, String), OutlineError> {
    let data = OutlineData {
        headers,
        page: request.page.clone(),
    };
    let output = build
        .renderer()
        .render(&request.template, &data)
        .await
        .map_err(|err| OutlineError::from(err).in_page(request.page.origin()))?;
    Ok((request.token.as_str().to_owned(), output))
}

/// Single pass over `base`: rendered outlines are never rescanned.
fn substitute(
    base: &str,
    outlines: &FxHashMap<String, String>,
    replace: ReplaceMode,
) -> Result<String, OutlineError> {
    let matcher = TokenMatcher::new(outlines.keys().map(String::as_str))?;
    let mut done = FxHashSet::default();
    let out = matcher
        .regex()
        .replace_all(base, |caps: &Captures<'_>| {
            let token = &caps[0];
            match outlines.get(token) {
                Some(output) if replace == ReplaceMode::All || done.insert(token.to_owned()) => {
                    output.clone()
                }
                _ => token.to_owned(),
            }
        })
        .into_owned();
    Ok(out)
}
