//! Header extraction.
//!
//! Walks the elements matched by a selector in document order and turns them
//! into [`HeaderRecord`]s. In dynamic mode, headers without an `id` get one
//! from the slug function and the document is modified in place.

use super::{HeaderRecord, Mode};
use crate::html::{Document, Selector, SelectorError};
use crate::slug::{SlugSet, Slugify};

/// Elements carrying this attribute never appear in an outline.
pub const IGNORE_ATTR: &str = "data-outline-ignore";

/// Result of one extraction pass.
#[derive(Debug, Default)]
pub struct Extraction {
    pub headers: Vec<HeaderRecord>,
    /// Whether an `id` attribute was added to the document.
    pub modified: bool,
}

/// Extract headers matching `selector` from `doc`.
///
/// With `slugs` set, generated ids are made unique within the page.
pub fn extract(
    doc: &mut Document,
    selector: &str,
    mode: Mode,
    slugify: &Slugify,
    mut slugs: Option<&mut SlugSet>,
) -> Result<Extraction, SelectorError> {
    let selector = Selector::parse(selector)?;
    let mut extraction = Extraction::default();

    for node in doc.query(&selector) {
        if doc.attr(node, IGNORE_ATTR).is_some() {
            continue;
        }

        let text = doc.text(node).to_owned();
        let id = match doc.attr(node, "id").filter(|id| !id.is_empty()) {
            Some(id) => id.to_owned(),
            None if mode == Mode::OptIn => continue,
            None => {
                let slug = slugify(&text);
                let slug = match slugs.as_deref_mut() {
                    Some(set) => set.claim(slug),
                    None => slug,
                };
                doc.set_attr(node, "id", slug.clone());
                extraction.modified = true;
                slug
            }
        };

        extraction.headers.push(HeaderRecord {
            id,
            text,
            tag: doc.tag_name(node).to_owned(),
        });
    }

    Ok(extraction)
}
