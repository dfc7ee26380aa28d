//! Template specs and the inline-template cache.
//!
//! A [`TemplateSpec`] is either a path the engine can render directly or an
//! inline `(lang, source)` pair. Inline templates are identified by a
//! [`TemplateHandle`] allocated when they are created: two inline templates
//! with identical text are still distinct, while clones share a handle.
//!
//! # Materialisation
//!
//! ```text
//! render(Inline #7)
//!     │
//!     ├── first use of #7 ──► write <tmp_dir>/<uuid>.<lang>, remember path
//!     │
//!     └── later uses ───────► reuse remembered path
//!                                   │
//!                                   ▼
//!                       engine.render_file(path, data)
//! ```

use super::engine::{RenderError, TemplateEngine};
use super::OutlineData;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use uuid::Uuid;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identity of an inline template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle(u64);

impl TemplateHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct InlineSource {
    handle: TemplateHandle,
    lang: String,
    source: String,
}

/// Inline template text; clones share identity.
#[derive(Clone)]
pub struct InlineTemplate(Arc<InlineSource>);

impl InlineTemplate {
    /// Create a template with a fresh identity.
    pub fn new(lang: impl Into<String>, source: impl Into<String>) -> Self {
        Self(Arc::new(InlineSource {
            handle: TemplateHandle::next(),
            lang: lang.into(),
            source: source.into(),
        }))
    }

    pub fn handle(&self) -> TemplateHandle {
        self.0.handle
    }

    pub fn lang(&self) -> &str {
        &self.0.lang
    }

    pub fn source(&self) -> &str {
        &self.0.source
    }
}

impl fmt::Debug for InlineTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineTemplate")
            .field("handle", &self.0.handle)
            .field("lang", &self.0.lang)
            .finish_non_exhaustive()
    }
}

/// Where outline markup comes from.
#[derive(Debug, Clone)]
pub enum TemplateSpec {
    /// A template file rendered by the engine as is.
    Path(PathBuf),
    /// Inline source, materialised to a file on first use.
    Inline(InlineTemplate),
}

impl TemplateSpec {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn inline(lang: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Inline(InlineTemplate::new(lang, source))
    }
}

impl<'de> Deserialize<'de> for TemplateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Path(PathBuf),
            Inline { lang: String, source: String },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Path(path) => Self::Path(path),
            Raw::Inline { lang, source } => Self::inline(lang, source),
        })
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Renders template specs, materialising inline templates once per handle.
pub struct TemplateRenderer {
    engine: Arc<dyn TemplateEngine>,
    tmp_dir: PathBuf,
    materialized: Mutex<FxHashMap<TemplateHandle, Arc<OnceCell<PathBuf>>>>,
}

impl TemplateRenderer {
    pub fn new(engine: Arc<dyn TemplateEngine>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            tmp_dir: tmp_dir.into(),
            materialized: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Render `spec` with `data`.
    ///
    /// Engine failures are returned unchanged.
    pub async fn render(&self, spec: &TemplateSpec, data: &OutlineData) -> Result<String, RenderError> {
        match spec {
            TemplateSpec::Path(path) => self.engine.render_file(path, data).await,
            TemplateSpec::Inline(inline) => {
                let path = self.materialize(inline).await?;
                self.engine.render_file(&path, data).await
            }
        }
    }

    /// Path of the file backing `inline`, writing it on first use.
    ///
    /// Concurrent first uses of the same handle write the file once.
    pub async fn materialize(&self, inline: &InlineTemplate) -> Result<PathBuf, RenderError> {
        if !self.engine.supports(inline.lang()) {
            return Err(RenderError::UnsupportedLanguage {
                lang: inline.lang().to_owned(),
            });
        }

        let cell = self
            .materialized
            .lock()
            .entry(inline.handle())
            .or_default()
            .clone();

        cell.get_or_try_init(|| async {
            tokio::fs::create_dir_all(&self.tmp_dir)
                .await
                .map_err(|err| RenderError::Io(self.tmp_dir.clone(), err))?;
            let path = self
                .tmp_dir
                .join(format!("{}.{}", Uuid::new_v4(), inline.lang()));
            tokio::fs::write(&path, inline.source())
                .await
                .map_err(|err| RenderError::Io(path.clone(), err))?;
            Ok::<_, RenderError>(path)
        })
        .await
        .cloned()
    }

    /// Number of inline templates currently written to disk.
    pub fn materialized_count(&self) -> usize {
        self.materialized
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Remove every materialised template, and `tmp_dir` once it is empty.
    ///
    /// Returns how many files were removed.
    pub fn cleanup(&self) -> Result<usize, RenderError> {
        let cells: Vec<_> = self.materialized.lock().drain().map(|(_, cell)| cell).collect();

        let mut removed = 0;
        for path in cells.iter().filter_map(|cell| cell.get()) {
            match std::fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(RenderError::Io(path.clone(), err)),
            }
        }

        // Only succeeds when nothing else lives in the directory
        if removed > 0 {
            std::fs::remove_dir(&self.tmp_dir).ok();
        }
        Ok(removed)
    }
}
