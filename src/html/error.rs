//! HTML and selector error types.

use thiserror::Error;

/// Failure while reading or writing markup.
#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("HTML parse error at position {position}: {source}")]
    Parse {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("failed to write rebuilt element")]
    Write(#[from] std::io::Error),
}

/// A header selector that cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid selector `{selector}` at {position}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub position: usize,
    pub reason: String,
}
