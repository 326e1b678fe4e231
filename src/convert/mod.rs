//! Format adapters providing a plugin architecture for source formats.
//!
//! Every adapter parses decoded text into the shared [`Document`] model.
//! The [`AdapterRegistry`] maps file extensions to adapters and falls back to
//! content sniffing when the extension is unknown.
//!
//! # Example
//!
//! ```
//! use docmark::convert::AdapterRegistry;
//! use docmark::config::ConvertersConfig;
//! use std::path::Path;
//!
//! let registry = AdapterRegistry::with_config(&ConvertersConfig::default());
//! let adapter = registry
//!     .detect(Some(Path::new("notes.html")), "<p>hi</p>")
//!     .unwrap();
//! assert_eq!(adapter.name(), "html");
//!
//! let doc = adapter.parse("<h1>Title</h1><p>Body</p>").unwrap();
//! assert_eq!(doc.block_count(), 2);
//! ```

mod builder;
mod html;
mod markdown;
mod text;
mod xml;

pub use html::HtmlAdapter;
pub use markdown::MarkdownAdapter;
pub use text::PlainTextAdapter;
pub use xml::XmlAdapter;

use crate::config::ConvertersConfig;
use crate::detect::extension_of;
use crate::error::{Error, Result};
use crate::model::Document;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Trait for source format adapters.
///
/// Implement this trait to add support for a new input format.
pub trait FormatAdapter: Send + Sync {
    /// Get the name of this adapter.
    fn name(&self) -> &str;

    /// Get the supported file extensions for this adapter.
    ///
    /// Extensions should be lowercase without the leading dot (e.g., `["html"]`).
    fn supported_extensions(&self) -> &[&str];

    /// Confidence in `[0, 1]` that this adapter can parse the input.
    fn detect(&self, path: Option<&Path>, content: &str) -> f32;

    /// Parse decoded text into a document.
    fn parse(&self, content: &str) -> Result<Document>;

    /// Check if this adapter supports the given extension.
    fn supports_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.supported_extensions().iter().any(|e| *e == ext)
    }
}

/// Confidence from a path's extension alone: 1.0 on a match, 0.0 for a
/// different extension, `None` when the path has no extension.
pub(crate) fn extension_confidence(
    adapter: &dyn FormatAdapter,
    path: Option<&Path>,
) -> Option<f32> {
    let ext = extension_of(path?)?;
    Some(if adapter.supports_extension(&ext) {
        1.0
    } else {
        0.0
    })
}

/// Registry of format adapters.
///
/// The registry maps file extensions to adapters and keeps registration
/// order for breaking confidence ties.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn FormatAdapter>>,
    by_extension: HashMap<String, Arc<dyn FormatAdapter>>,
    by_name: HashMap<String, Arc<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in adapters configured by `config`.
    pub fn with_config(config: &ConvertersConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkdownAdapter::new(config.markdown.clone())));
        registry.register(Arc::new(HtmlAdapter::new(config.html.clone())));
        registry.register(Arc::new(XmlAdapter::new(config.xml.clone())));
        registry.register(Arc::new(PlainTextAdapter::new(config.text.clone())));
        registry
    }

    /// Register an adapter for all its supported extensions.
    ///
    /// A later registration replaces earlier ones for shared extensions.
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) {
        for ext in adapter.supported_extensions() {
            self.by_extension.insert(ext.to_lowercase(), adapter.clone());
        }
        self.by_name
            .insert(adapter.name().to_lowercase(), adapter.clone());
        self.adapters.push(adapter);
    }

    /// Get an adapter by file extension.
    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn FormatAdapter>> {
        self.by_extension
            .get(&ext.trim_start_matches('.').to_lowercase())
            .cloned()
    }

    /// Get an adapter by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn FormatAdapter>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Check if an extension is supported.
    pub fn supports(&self, ext: &str) -> bool {
        self.get_by_extension(ext).is_some()
    }

    /// Get all supported extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Select the adapter for an input.
    ///
    /// A registered extension wins outright. Otherwise every adapter is asked
    /// for its confidence and the highest wins, earlier registrations
    /// winning ties.
    pub fn detect(&self, path: Option<&Path>, content: &str) -> Result<Arc<dyn FormatAdapter>> {
        if let Some(adapter) = path
            .and_then(extension_of)
            .and_then(|ext| self.get_by_extension(&ext))
        {
            log::debug!("Selected {} adapter by extension", adapter.name());
            return Ok(adapter);
        }

        let mut best: Option<(f32, &Arc<dyn FormatAdapter>)> = None;
        for adapter in &self.adapters {
            let confidence = adapter.detect(path, content).clamp(0.0, 1.0);
            if confidence > best.map_or(0.0, |(c, _)| c) {
                best = Some((confidence, adapter));
            }
        }

        match best {
            Some((confidence, adapter)) => {
                log::debug!(
                    "Selected {} adapter by content (confidence {:.2})",
                    adapter.name(),
                    confidence
                );
                Ok(adapter.clone())
            }
            None => Err(Error::UnsupportedFormat(match path {
                Some(p) => format!("no adapter recognizes {}", p.display()),
                None => "no adapter recognizes the content".to_string(),
            })),
        }
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
