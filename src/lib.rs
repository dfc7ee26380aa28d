//! Tola Outline - deferred document outlines for rendered HTML pages.
//!
//! A page asks for its outline while it is still being rendered, before the
//! headers further down (or in included templates) exist. The request is
//! answered with a placeholder token; once the page is complete, the token
//! is replaced by the outline rendered from the page's actual headers.
//!
//! ```ignore
//! let mut pipeline = Pipeline::new();
//! DocumentOutline::install(&mut pipeline, OutlineOptions::load(Path::new("outline.toml"))?);
//!
//! pipeline.start_build()?;
//! let token = pipeline.shortcode("outline", &page, &["h2,h3".into()])?;
//! let html = pipeline.render_page(&page, render_with(token)).await?;
//! pipeline.end_build()?;
//! ```

pub mod logger;

pub mod config;
pub mod error;
pub mod host;
pub mod html;
pub mod outline;
pub mod plugin;
pub mod slug;

pub use config::OutlineConfig;
pub use error::OutlineError;
pub use host::{BuildEvent, Host, Pipeline};
pub use outline::{HeaderRecord, Mode, Page, TemplateSpec, Token};
pub use plugin::{DocumentOutline, OutlineArgs, OutlineOptions, ParsedOutline};
