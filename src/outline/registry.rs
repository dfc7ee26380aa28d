//! Outline request registry.
//!
//! Authoring-time outline calls register a request and embed the returned
//! [`Token`] in the page. After the page is fully rendered, the resolution
//! pass finds the tokens again and looks their requests up here.

use super::{Mode, Page, TemplateSpec};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Placeholder embedded in page output until the outline is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Finds the literal occurrences of a fixed set of tokens.
///
/// Only registered tokens match, so UUID-shaped page text next to a token
/// can never shift or swallow it.
#[derive(Debug, Clone)]
pub(crate) struct TokenMatcher(Regex);

impl TokenMatcher {
    /// `tokens` must not be empty: an empty alternation matches everywhere.
    pub(crate) fn new<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, regex::Error> {
        let pattern = tokens
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&pattern).map(Self)
    }

    pub(crate) fn find_iter<'h>(&self, content: &'h str) -> impl Iterator<Item = &'h str> {
        self.0.find_iter(content).map(|m| m.as_str())
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.0
    }
}

/// Everything needed to resolve one outline once its page is complete.
#[derive(Debug, Clone)]
pub struct OutlineRequest {
    pub token: Token,
    /// Page that issued the request.
    pub page: Page,
    pub selector: String,
    pub mode: Mode,
    pub template: TemplateSpec,
}

#[derive(Debug, Default)]
struct Requests {
    by_token: FxHashMap<String, Arc<OutlineRequest>>,
    /// Built on first scan, dropped whenever the token set changes.
    matcher: Option<Arc<TokenMatcher>>,
}

/// Token to request mapping for one build.
#[derive(Debug, Default)]
pub struct Registry {
    requests: RwLock<Requests>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request and return its fresh token.
    pub fn register(
        &self,
        page: Page,
        selector: impl Into<String>,
        mode: Mode,
        template: TemplateSpec,
    ) -> Token {
        let token = Token::generate();
        let request = OutlineRequest {
            token: token.clone(),
            page,
            selector: selector.into(),
            mode,
            template,
        };
        let mut requests = self.requests.write();
        requests
            .by_token
            .insert(token.0.clone(), Arc::new(request));
        requests.matcher = None;
        token
    }

    pub fn lookup(&self, token: &str) -> Option<Arc<OutlineRequest>> {
        self.requests.read().by_token.get(token).cloned()
    }

    /// Forget every request.
    pub fn clear(&self) {
        let mut requests = self.requests.write();
        requests.by_token.clear();
        requests.matcher = None;
    }

    pub fn len(&self) -> usize {
        self.requests.read().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.read().by_token.is_empty()
    }

    /// Registered requests whose tokens occur in `content`.
    ///
    /// Each request appears once, in order of first occurrence. Token-shaped
    /// text that was never registered is ignored.
    pub fn find_in(&self, content: &str) -> Result<Vec<Arc<OutlineRequest>>, regex::Error> {
        let matcher = {
            let requests = self.requests.read();
            if requests.by_token.is_empty() {
                return Ok(Vec::new());
            }
            requests.matcher.clone()
        };
        let matcher = match matcher {
            Some(matcher) => matcher,
            None => self.rebuild_matcher()?,
        };

        let requests = self.requests.read();
        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for token in matcher.find_iter(content) {
            if let Some(request) = requests.by_token.get(token)
                && seen.insert(token)
            {
                found.push(request.clone());
            }
        }
        Ok(found)
    }

    fn rebuild_matcher(&self) -> Result<Arc<TokenMatcher>, regex::Error> {
        let mut requests = self.requests.write();
        if let Some(matcher) = &requests.matcher {
            return Ok(matcher.clone());
        }
        let matcher = Arc::new(TokenMatcher::new(
            requests.by_token.keys().map(String::as_str),
        )?);
        requests.matcher = Some(matcher.clone());
        Ok(matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &Registry, selector: &str) -> Token {
        registry.register(
            Page::new("/", "public/index.html"),
            selector,
            Mode::OptIn,
            TemplateSpec::path("toc.jinja"),
        )
    }

    #[test]
    fn test_tokens_are_unique_uuids() {
        let registry = Registry::new();
        let a = register(&registry, "h2");
        let b = register(&registry, "h2");

        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_and_clear() {
        let registry = Registry::new();
        let token = register(&registry, "h2,h3");

        let request = registry.lookup(token.as_str()).unwrap();
        assert_eq!(request.selector, "h2,h3");
        assert_eq!(request.token, token);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup(token.as_str()).is_none());
    }

    #[test]
    fn test_find_in_dedupes_in_order() {
        let registry = Registry::new();
        let a = register(&registry, "h2");
        let b = register(&registry, "h3");
        let _unused = register(&registry, "h4");

        let content = format!("<p>{b}</p><p>{a}</p><p>{b}</p>");
        let found: Vec<_> = registry
            .find_in(&content)
            .unwrap()
            .iter()
            .map(|request| request.selector.clone())
            .collect();
        assert_eq!(found, vec!["h3", "h2"]);
    }

    #[test]
    fn test_find_in_ignores_unknown_tokens() {
        let registry = Registry::new();
        register(&registry, "h2");

        let stranger = Uuid::new_v4().to_string();
        assert!(registry.find_in(&format!("<p>{stranger}</p>")).unwrap().is_empty());
        assert!(registry.find_in("<p>no tokens</p>").unwrap().is_empty());
    }

    #[test]
    fn test_find_in_after_clear() {
        let registry = Registry::new();
        let token = register(&registry, "h2");
        registry.clear();
        assert!(registry.find_in(token.as_str()).unwrap().is_empty());
    }

    #[test]
    fn test_find_in_next_to_uuid_shaped_text() {
        let registry = Registry::new();
        let token = register(&registry, "h2");

        let content = format!("<p>aaaaaaaa-bbbb-cccc-dddd-eeeeee{token}</p>");
        let found = registry.find_in(&content).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].token, token);
    }

    #[test]
    fn test_find_in_sees_tokens_registered_after_a_scan() {
        let registry = Registry::new();
        let a = register(&registry, "h2");
        assert_eq!(registry.find_in(a.as_str()).unwrap().len(), 1);

        let b = register(&registry, "h3");
        let found = registry.find_in(&format!("{a}{b}")).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].selector, "h3");
    }
}
