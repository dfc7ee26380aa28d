//! Errors surfaced to the host pipeline.

use crate::html::{HtmlError, SelectorError};
use crate::outline::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The token set grew past what one scan pattern can hold.
    #[error("failed to build token matcher: {0}")]
    Tokens(#[from] regex::Error),

    /// Failure while resolving an outline requested by `page`.
    #[error("outline requested by `{page}` failed: {source}")]
    Request {
        page: String,
        #[source]
        source: Box<OutlineError>,
    },
}

impl OutlineError {
    pub(crate) fn in_page(self, page: String) -> Self {
        Self::Request {
            page,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping request context.
    pub fn root(&self) -> &OutlineError {
        match self {
            Self::Request { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::Selector;

    #[test]
    fn test_request_keeps_inner_message() {
        let inner = Selector::parse("h2[").unwrap_err();
        let message = inner.to_string();
        let err = OutlineError::from(inner).in_page("content/index.md".into());

        let display = err.to_string();
        assert!(display.contains("content/index.md"));
        assert!(display.contains(&message));
        assert!(matches!(err.root(), OutlineError::Selector(_)));
    }
}
