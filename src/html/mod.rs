//! HTML handling for outline resolution.
//!
//! A lenient, parse-once element arena over `quick-xml` events, plus the
//! selector subset used to pick headers.

mod common;
mod document;
mod error;
mod selector;

pub use document::{Document, NodeId};
pub use error::{HtmlError, SelectorError};
pub use selector::Selector;
