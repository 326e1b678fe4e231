//! # docmark
//!
//! Convert plain text, Markdown, HTML and XML documents into normalized
//! Markdown.
//!
//! Every input is parsed by a format adapter into a small document model
//! (headings, paragraphs, nested lists, code blocks, bold and italic spans)
//! and written back out by a canonical Markdown writer. Files are read and
//! written only inside a sandbox, outputs are replaced atomically, and whole
//! directories are converted on a worker pool.
//!
//! ## Quick Start
//!
//! ```
//! use docmark::to_markdown;
//! use std::path::Path;
//!
//! fn main() -> docmark::Result<()> {
//!     let html = "<h1>Notes</h1><ul><li>one</li><li><b>two</b></li></ul>";
//!     let markdown = to_markdown(html, Some(Path::new("notes.html")))?;
//!     assert_eq!(markdown, "# Notes\n\n- one\n- **two**\n");
//!     Ok(())
//! }
//! ```
//!
//! ## Converting files
//!
//! ```no_run
//! use docmark::Docmark;
//! use std::path::Path;
//!
//! let processor = Docmark::new().strict().with_frontmatter().build_directory()?;
//! let results = processor.process_directory(
//!     Path::new("docs"),
//!     Path::new("out"),
//!     "markdown",
//!     true,
//!     None,
//! )?;
//! for result in &results {
//!     println!("{} ok={}", result.input_path().display(), result.is_success());
//! }
//! # Ok::<(), docmark::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Format adapters**: plain text, Markdown, HTML and configurable XML
//! - **Canonical output**: re-parsing the output yields the same document
//! - **Sandboxing**: allowed roots, size and depth limits, symlink policies
//! - **Profiles**: `standard`, `strict` and `fast` with dotted-path overrides
//! - **Parallel processing**: Uses Rayon for directory runs

pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod parallel;
pub mod processor;
pub mod render;
pub mod security;

// Re-export commonly used types
pub use config::{Config, ParserMode, ProcessorConfig, Profile};
pub use convert::{AdapterRegistry, FormatAdapter};
pub use error::{Error, ErrorKind, Result};
pub use model::{Block, Document, Inline, List, ListItem, Metadata};
pub use parallel::{ParallelExecutor, TaskHandle};
pub use processor::{
    create_directory_processor, create_processor, DirectoryProcessor, Metrics, OutputFormat,
    ProcessingResult, ResultError, SingleFileProcessor,
};
pub use render::{MarkdownWriter, WriterOptions};
pub use security::{Access, SecurityContext, SecurityGuard, SymlinkPolicy};

use serde_json::{Map, Value};
use std::path::Path;

/// Parse text into a document with the default adapters.
///
/// The adapter is chosen from `path_hint`'s extension when it has one,
/// otherwise from the content.
///
/// # Example
///
/// ```
/// use docmark::{parse_str, Block};
///
/// let doc = parse_str("# Title\n\nBody", None).unwrap();
/// assert_eq!(doc.blocks[0], Block::heading_text(1, "Title"));
/// assert_eq!(doc.metadata.title(), Some("Title"));
/// ```
pub fn parse_str(content: &str, path_hint: Option<&Path>) -> Result<Document> {
    let registry = AdapterRegistry::with_config(&config::ConvertersConfig::default());
    let adapter = registry.detect(path_hint, content)?;
    adapter.parse(content)
}

/// Convert text to Markdown with default options.
pub fn to_markdown(content: &str, path_hint: Option<&Path>) -> Result<String> {
    let doc = parse_str(content, path_hint)?;
    Ok(render::to_markdown(&doc, &WriterOptions::default()))
}

/// Convert one file with the `standard` profile.
///
/// The sandbox root is the current directory. Per-file failures are
/// reported in the returned result.
///
/// # Example
///
/// ```no_run
/// use docmark::convert_file;
///
/// let result = convert_file("page.html", "page.md").unwrap();
/// assert!(result.is_success());
/// ```
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<ProcessingResult> {
    let processor = create_processor("standard", &Value::Null)?;
    Ok(processor.process_file(input.as_ref(), output.as_ref(), "markdown"))
}

/// Convert every supported file below `input` with the `standard` profile.
pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    recursive: bool,
) -> Result<Vec<ProcessingResult>> {
    let processor = create_directory_processor("standard", &Value::Null)?;
    processor.process_directory(input.as_ref(), output.as_ref(), "markdown", recursive, None)
}

/// Builder for configured processors.
///
/// # Example
///
/// ```
/// use docmark::{Docmark, ParserMode, Profile};
/// use serde_json::json;
///
/// let processor = Docmark::new()
///     .profile(Profile::Fast)
///     .set("converters.text.paragraph_break_lines", json!(2))
///     .with_html_parser(ParserMode::Strict)
///     .build()?;
/// assert_eq!(processor.config().converters.text.paragraph_break_lines, 2);
/// # Ok::<(), docmark::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Docmark {
    profile: Profile,
    overrides: Map<String, Value>,
}

impl Docmark {
    /// Create a builder on the `standard` profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from another profile.
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Override one option by dotted path.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(path.into(), value);
        self
    }

    /// Set the HTML parser mode.
    pub fn with_html_parser(self, mode: ParserMode) -> Self {
        self.set("converters.html.parser", mode_value(mode))
    }

    /// Use strict HTML and XML parsing.
    pub fn strict(self) -> Self {
        self.with_html_parser(ParserMode::Strict)
            .set("converters.xml.parser", mode_value(ParserMode::Strict))
    }

    /// Prepend YAML front matter to every output.
    pub fn with_frontmatter(self) -> Self {
        self.set("output.include_frontmatter", Value::Bool(true))
    }

    /// Size the worker pool (0 = available parallelism).
    pub fn with_workers(self, count: usize) -> Self {
        self.set("parallel.worker_count", Value::from(count))
    }

    /// Restrict file access to `root`.
    pub fn with_root(self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_string_lossy().into_owned();
        self.set("security.allowed_roots", Value::Array(vec![Value::String(root)]))
    }

    /// The overrides collected so far.
    pub fn overrides(&self) -> Value {
        Value::Object(self.overrides.clone())
    }

    /// Build a single-file processor.
    pub fn build(&self) -> Result<SingleFileProcessor> {
        create_processor(self.profile.name(), &self.overrides())
    }

    /// Build a directory processor.
    pub fn build_directory(&self) -> Result<DirectoryProcessor> {
        create_directory_processor(self.profile.name(), &self.overrides())
    }
}

fn mode_value(mode: ParserMode) -> Value {
    match mode {
        ParserMode::Lenient => Value::String("lenient".to_string()),
        ParserMode::Strict => Value::String("strict".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_docmark_builder() {
        let builder = Docmark::new().strict().with_frontmatter().with_workers(3);
        assert_eq!(
            builder.overrides(),
            json!({
                "converters.html.parser": "strict",
                "converters.xml.parser": "strict",
                "output.include_frontmatter": true,
                "parallel.worker_count": 3
            })
        );

        let processor = builder.build().unwrap();
        let config = processor.config();
        assert_eq!(config.converters.html.parser, ParserMode::Strict);
        assert_eq!(config.converters.xml.parser, ParserMode::Strict);
        assert!(config.output.include_frontmatter);
    }

    #[test]
    fn test_docmark_builder_default() {
        let processor = Docmark::default().build().unwrap();
        assert_eq!(*processor.config().as_ref(), ProcessorConfig::default());
    }

    #[test]
    fn test_docmark_builder_rejects_unknown_option() {
        let err = Docmark::new()
            .set("converters.html.engine", json!("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_to_markdown_by_content() {
        let markdown = to_markdown("<?xml version=\"1.0\"?><doc><title>T</title></doc>", None).unwrap();
        assert_eq!(markdown, "# T\n");
    }

    #[test]
    fn test_parse_str_unsupported() {
        assert!(matches!(
            parse_str("x", Some(Path::new("file.pdf"))),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
