//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

use crate::outline::{InlineTemplate, TemplateSpec};
use std::path::PathBuf;

/// Language of the built-in outline template.
pub const TEMPLATE_LANG: &str = "jinja";

/// Built-in outline template: one anchor per header.
pub const TEMPLATE_SOURCE: &str = concat!(
    "{% for header in headers %}",
    r##"<a href="#{{ header.id }}" class="link-{{ header.tag }}">{{ header.text | escape }}</a>"##,
    "{% endfor %}",
);

pub fn r#false() -> bool {
    false
}

pub fn headers() -> String {
    "h1,h2,h3".into()
}

pub fn template() -> TemplateSpec {
    TemplateSpec::Inline(InlineTemplate::new(TEMPLATE_LANG, TEMPLATE_SOURCE))
}

pub fn tmp_dir() -> PathBuf {
    ".outline-templates".into()
}

pub mod slug {
    use super::super::SlugMode;

    pub fn mode() -> SlugMode {
        SlugMode::On
    }
}
