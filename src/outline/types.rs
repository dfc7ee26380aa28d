//! Data types shared by the outline pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How headers without an `id` attribute are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Only headers that already carry an `id` are listed.
    #[default]
    #[serde(rename = "optin")]
    OptIn,
    /// Headers without an `id` get one generated from their text.
    #[serde(rename = "dynamic")]
    Dynamic,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OptIn => "optin",
            Self::Dynamic => "dynamic",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optin" => Ok(Self::OptIn),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown outline mode `{other}`, expected `optin` or `dynamic`")),
        }
    }
}

/// A page going through the host pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Public URL of the page (e.g., `/posts/hello/`).
    pub url: String,
    /// Source file the page was rendered from, if any.
    pub input_path: Option<PathBuf>,
    /// File the rendered page is written to.
    pub output_path: PathBuf,
}

impl Page {
    pub fn new(url: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            input_path: None,
            output_path: output_path.into(),
        }
    }

    pub fn with_input(mut self, input_path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(input_path.into());
        self
    }

    /// Whether the output is an HTML document.
    pub fn is_html(&self) -> bool {
        self.output_path.extension().is_some_and(|ext| ext == "html")
    }

    /// The most specific name for error messages: source file, else URL.
    pub fn origin(&self) -> String {
        self.input_path
            .as_deref()
            .map(Path::display)
            .map(|path| path.to_string())
            .unwrap_or_else(|| self.url.clone())
    }
}

/// One header found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRecord {
    /// Existing or generated `id` attribute.
    pub id: String,
    /// Text content.
    pub text: String,
    /// Lower-cased tag name (e.g., `h2`).
    pub tag: String,
}

/// Data handed to outline templates.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineData {
    pub headers: Vec<HeaderRecord>,
    pub page: Page,
}
