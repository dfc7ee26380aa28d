//! `[slug]` section configuration.

use super::defaults;
use educe::Educe;
use serde::Deserialize;

/// Slug generation mode for dynamically assigned header ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlugMode {
    /// Lower-case ASCII kebab slug (e.g., "Hello World" → "hello-world").
    #[default]
    On,
    /// Strip characters that break fragments; keep everything else.
    Safe,
    /// No slugification; use the header text as is.
    No,
}

/// `[slug]` section in outline.toml.
///
/// # Example
/// ```toml
/// [slug]
/// mode = "on"
/// dedupe = true
/// ```
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SlugConfig {
    #[serde(default = "defaults::slug::mode")]
    #[educe(Default = defaults::slug::mode())]
    pub mode: SlugMode,

    /// Suffix `-1`, `-2`, ... onto generated ids that collide within a page.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub dedupe: bool,
}
