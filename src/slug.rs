//! Header id slugification.
//!
//! Converts header text to fragment-safe identifiers for dynamic mode.

use crate::config::SlugMode;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Injected slug function: pure, deterministic for a given input.
pub type Slugify = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Characters forbidden in fragments
const FORBIDDEN_CHARS: &[char] = &[
    '<', '>', ':', '|', '?', '*', '#', '\\', '(', ')', '[', ']', '\t', '\r', '\n', '"', '\'',
];

// ============================================================================
// Slugification
// ============================================================================

/// Convert header text to a fragment id based on `mode`.
pub fn slugify(text: &str, mode: SlugMode) -> String {
    match mode {
        SlugMode::On => ::slug::slugify(text),
        SlugMode::Safe => sanitize_text(text),
        SlugMode::No => text.to_owned(),
    }
}

/// Build the default slug function for `mode`.
pub fn slugifier(mode: SlugMode) -> Slugify {
    Arc::new(move |text: &str| slugify(text, mode))
}

/// Remove forbidden characters and replace whitespace with underscores
fn sanitize_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

// ============================================================================
// Collision handling
// ============================================================================

/// Ids already taken within one page.
///
/// Used when `[slug] dedupe = true`: the second "intro" becomes "intro-1",
/// the third "intro-2", skipping any suffix that is itself taken.
#[derive(Debug, Default)]
pub struct SlugSet {
    used: FxHashSet<String>,
}

impl SlugSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the set with ids that already exist in the document.
    pub fn with_existing<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            used: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Return `slug`, or the first free `slug-N`, and mark it as taken.
    pub fn claim(&mut self, slug: String) -> String {
        if self.used.insert(slug.clone()) {
            return slug;
        }
        let unique = (1..)
            .map(|n| format!("{slug}-{n}"))
            .find(|candidate| !self.used.contains(candidate))
            .unwrap_or_default();
        self.used.insert(unique.clone());
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_on_is_lower_kebab() {
        assert_eq!(slugify("Intro", SlugMode::On), "intro");
        assert_eq!(slugify("Hello World!", SlugMode::On), "hello-world");
    }

    #[test]
    fn test_slugify_safe_removes_forbidden_chars() {
        assert_eq!(slugify("  Hello (World) [Test]: #anchor?  ", SlugMode::Safe), "Hello_World_Test_anchor");
        assert_eq!(slugify("你好世界", SlugMode::Safe), "你好世界");
    }

    #[test]
    fn test_slugify_no_keeps_text() {
        assert_eq!(slugify("Hello World", SlugMode::No), "Hello World");
    }

    #[test]
    fn test_slugifier_matches_slugify() {
        let f = slugifier(SlugMode::On);
        assert_eq!(f("Getting Started"), slugify("Getting Started", SlugMode::On));
    }

    #[test]
    fn test_sanitize_text_empty_string() {
        assert_eq!(sanitize_text(""), "");
        assert_eq!(sanitize_text("<>:?*#"), "");
    }

    #[test]
    fn test_slug_set_suffixes_collisions() {
        let mut set = SlugSet::new();
        assert_eq!(set.claim("intro".into()), "intro");
        assert_eq!(set.claim("intro".into()), "intro-1");
        assert_eq!(set.claim("intro".into()), "intro-2");
        assert_eq!(set.claim("usage".into()), "usage");
    }

    #[test]
    fn test_slug_set_skips_taken_suffix() {
        let mut set = SlugSet::with_existing(["intro", "intro-1"]);
        assert_eq!(set.claim("intro".into()), "intro-2");
    }
}
