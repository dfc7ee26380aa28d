//! Deferred document outlines.
//!
//! An outline is requested while a page is still being authored, before its
//! headers are known. The request is registered and a [`Token`] is embedded
//! in place; once the page is fully rendered, [`resolve`] extracts the
//! headers and swaps each token for its rendered outline.
//!
//! | Module     | Role                                           |
//! |------------|------------------------------------------------|
//! | `header`   | header extraction from a parsed page           |
//! | `engine`   | template engine abstraction and MiniJinja impl |
//! | `template` | template specs and inline template cache       |
//! | `registry` | token to request mapping                       |
//! | `build`    | build-scoped registry and renderer             |
//! | `resolve`  | per-page token resolution                      |

mod build;
mod engine;
mod header;
mod registry;
mod resolve;
mod template;
mod types;

pub use build::BuildContext;
pub use engine::{JINJA_LANGUAGES, JinjaEngine, RenderError, TemplateEngine};
pub use header::{Extraction, IGNORE_ATTR, extract};
pub use registry::{OutlineRequest, Registry, Token};
pub use resolve::{ResolveOptions, resolve};
pub use template::{InlineTemplate, TemplateHandle, TemplateRenderer, TemplateSpec};
pub use types::{HeaderRecord, Mode, OutlineData, Page};
