//! Outline configuration, usually loaded from `outline.toml`.
//!
//! # Keys
//!
//! | Key        | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `headers`  | Default selector for outline headers             |
//! | `template` | Default template (path or inline `lang`/`source`) |
//! | `mode`     | Default resolution mode (`optin` / `dynamic`)    |
//! | `tmp_dir`  | Directory for materialised inline templates      |
//! | `replace`  | Replace every token occurrence or only the first |
//! | `verbose`  | Log one line per resolved page                   |
//! | `[slug]`   | Slug generation for dynamic ids                  |
//!
//! # Example
//!
//! ```toml
//! headers = "h2,h3"
//! mode = "dynamic"
//! template = "templates/toc.html"
//!
//! [slug]
//! mode = "on"
//! dedupe = true
//! ```

pub mod defaults;
mod error;
mod slug;

pub use error::ConfigError;
pub use self::slug::{SlugConfig, SlugMode};

use crate::html::Selector;
use crate::outline::{Mode, TemplateSpec};
use anyhow::{Result, bail};
use educe::Educe;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// How many occurrences of a token are substituted within one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    /// Every occurrence gets the rendered outline (default).
    #[default]
    All,
    /// Only the first occurrence is substituted; later ones stay literal.
    First,
}

/// Root configuration structure representing `outline.toml`.
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct OutlineConfig {
    /// Selector used when an outline call does not name one.
    #[serde(default = "defaults::headers")]
    #[educe(Default = defaults::headers())]
    pub headers: String,

    /// Template used when an outline call does not name one.
    #[serde(default = "defaults::template")]
    #[educe(Default = defaults::template())]
    pub template: TemplateSpec,

    /// Resolution mode used when an outline call does not name one.
    #[serde(default)]
    pub mode: Mode,

    /// Where inline templates are written so the engine can address them.
    #[serde(default = "defaults::tmp_dir")]
    #[educe(Default = defaults::tmp_dir())]
    pub tmp_dir: PathBuf,

    #[serde(default)]
    pub replace: ReplaceMode,

    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub verbose: bool,

    #[serde(default)]
    pub slug: SlugConfig,
}

impl OutlineConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: OutlineConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Resolve `tmp_dir` against `root`, expanding a leading `~`.
    pub fn tmp_dir_in(&self, root: &Path) -> PathBuf {
        let raw = self.tmp_dir.to_string_lossy();
        let expanded = PathBuf::from(shellexpand::tilde(&raw).into_owned());
        if expanded.is_relative() {
            root.join(expanded)
        } else {
            expanded
        }
    }

    /// Validate configuration values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.headers.trim().is_empty() {
            bail!(ConfigError::Validation("[headers] must not be empty".into()));
        }
        if let Err(err) = Selector::parse(&self.headers) {
            bail!(ConfigError::Validation(format!("[headers] {err}")));
        }
        if let TemplateSpec::Inline(inline) = &self.template
            && inline.lang().trim().is_empty()
        {
            bail!(ConfigError::Validation(
                "[template.lang] must not be empty".into()
            ));
        }
        if self.tmp_dir.as_os_str().is_empty() {
            bail!(ConfigError::Validation("[tmp_dir] must not be empty".into()));
        }
        Ok(())
    }
}
