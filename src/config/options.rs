//! Typed conversion options.
//!
//! These structs are the deserialized form of a merged [`super::Config`]
//! mapping. Every field has a default, so a partial mapping is valid, while
//! unknown keys are rejected.

use crate::security::SymlinkPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete option set for a processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Processing behavior
    pub general: GeneralOptions,

    /// Per-format adapter options
    pub converters: ConvertersConfig,

    /// Sandbox policy
    pub security: SecurityOptions,

    /// Worker pool sizing
    pub parallel: ParallelOptions,

    /// Markdown output
    pub output: OutputOptions,
}

/// General processing behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralOptions {
    /// Surface parse errors from `try_process_file` instead of converting them
    pub propagate_parse_errors: bool,

    /// Replace output files that already exist
    pub overwrite_existing: bool,

    /// Per-task time budget in milliseconds for directory runs
    pub task_timeout_ms: Option<u64>,

    /// Force an input encoding label (e.g. `windows-1252`) instead of detecting it
    pub input_encoding: Option<String>,
}

impl Default for GeneralOptions {
    fn default() -> Self {
        Self {
            propagate_parse_errors: false,
            overwrite_existing: true,
            task_timeout_ms: None,
            input_encoding: None,
        }
    }
}

/// Options for every built-in adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertersConfig {
    /// Plain text adapter
    pub text: TextOptions,

    /// Markdown adapter
    pub markdown: MarkdownOptions,

    /// HTML adapter
    pub html: HtmlOptions,

    /// XML adapter
    pub xml: XmlOptions,
}

/// Malformed-input tolerance of a markup parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserMode {
    /// Recover from unclosed and misnested tags
    ///
    /// The backend names `lxml`, `html.parser` and `html5lib` select this
    /// mode too; all of them recover from malformed markup.
    #[default]
    #[serde(alias = "lxml", alias = "html.parser", alias = "html5lib")]
    Lenient,
    /// Fail on any structural error
    Strict,
}

/// Plain text paragraph inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextOptions {
    /// Number of consecutive blank lines that end a paragraph
    pub paragraph_break_lines: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            paragraph_break_lines: 1,
        }
    }
}

impl TextOptions {
    /// Set the paragraph break threshold (at least one line).
    pub fn with_paragraph_break_lines(mut self, lines: usize) -> Self {
        self.paragraph_break_lines = lines.max(1);
        self
    }
}

/// Markdown re-normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    /// Read `---` delimited front matter into metadata (otherwise it is dropped)
    pub extract_frontmatter: bool,

    /// Use the first level-1 heading as title when none is declared
    pub title_from_heading: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            extract_frontmatter: true,
            title_from_heading: true,
        }
    }
}

/// HTML parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlOptions {
    /// Parser tolerance
    pub parser: ParserMode,

    /// Read `<title>` and `<meta>` into metadata
    pub extract_metadata: bool,

    /// Elements removed together with their contents
    pub strip_elements: Vec<String>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            parser: ParserMode::Lenient,
            extract_metadata: true,
            strip_elements: [
                "script", "style", "noscript", "template", "iframe", "object", "svg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl HtmlOptions {
    /// Set parser mode.
    pub fn with_parser(mut self, parser: ParserMode) -> Self {
        self.parser = parser;
        self
    }

    /// Enable strict parsing.
    pub fn strict(self) -> Self {
        self.with_parser(ParserMode::Strict)
    }
}

/// Generic XML element classification.
///
/// Names are matched case-insensitively against the element's local name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XmlOptions {
    /// Parser tolerance
    pub parser: ParserMode,

    /// Collect metadata elements
    pub extract_metadata: bool,

    /// Heading-like elements and their heading level
    pub heading_elements: BTreeMap<String, u8>,

    /// Content-like elements rendered as plain paragraphs
    pub paragraph_elements: Vec<String>,

    /// Elements rendered as bulleted lists
    pub list_elements: Vec<String>,

    /// Elements rendered as numbered lists
    pub ordered_list_elements: Vec<String>,

    /// List item elements
    pub item_elements: Vec<String>,

    /// Elements rendered verbatim as code blocks
    pub code_elements: Vec<String>,

    /// Inline elements rendered as bold
    pub bold_elements: Vec<String>,

    /// Inline elements rendered as italic
    pub italic_elements: Vec<String>,

    /// Elements whose text becomes a metadata entry (element name to key)
    pub metadata_elements: BTreeMap<String, String>,

    /// Elements whose whole subtree feeds metadata only
    pub metadata_containers: Vec<String>,

    /// Elements dropped with their contents
    pub skip_elements: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for XmlOptions {
    fn default() -> Self {
        let heading_elements = [
            ("title", 1),
            ("heading", 2),
            ("subtitle", 2),
            ("h1", 1),
            ("h2", 2),
            ("h3", 3),
            ("h4", 4),
            ("h5", 5),
            ("h6", 6),
        ]
        .iter()
        .map(|(name, level)| (name.to_string(), *level))
        .collect();

        let metadata_elements = [
            ("author", "author"),
            ("creator", "author"),
            ("date", "date"),
            ("description", "description"),
            ("keywords", "keywords"),
        ]
        .iter()
        .map(|(name, key)| (name.to_string(), key.to_string()))
        .collect();

        Self {
            parser: ParserMode::Lenient,
            extract_metadata: true,
            heading_elements,
            paragraph_elements: names(&["paragraph", "para", "p", "abstract", "summary"]),
            list_elements: names(&["list", "ul", "itemizedlist"]),
            ordered_list_elements: names(&["ol", "orderedlist"]),
            item_elements: names(&["item", "li", "listitem", "entry"]),
            code_elements: names(&["code", "pre", "programlisting", "screen"]),
            bold_elements: names(&["b", "strong", "bold"]),
            italic_elements: names(&["i", "em", "emphasis", "italic"]),
            metadata_elements,
            metadata_containers: names(&["metadata", "meta", "info", "head"]),
            skip_elements: names(&["script", "style", "comment"]),
        }
    }
}

impl XmlOptions {
    /// Map an element name to a heading level.
    pub fn with_heading(mut self, element: impl Into<String>, level: u8) -> Self {
        self.heading_elements
            .insert(element.into().to_lowercase(), level.clamp(1, 6));
        self
    }

    /// Treat an element as a plain paragraph.
    pub fn with_paragraph(mut self, element: impl Into<String>) -> Self {
        self.paragraph_elements.push(element.into().to_lowercase());
        self
    }
}

/// Sandbox policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityOptions {
    /// Directories every path must stay within (empty = current directory)
    pub allowed_roots: Vec<PathBuf>,

    /// Largest readable input in bytes
    pub max_file_size: u64,

    /// How symbolic links are treated
    pub symlink_policy: SymlinkPolicy,

    /// Deepest allowed path below a root
    pub max_depth: usize,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            max_file_size: 100 * 1024 * 1024,
            symlink_policy: SymlinkPolicy::Resolve,
            max_depth: 32,
        }
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallelOptions {
    /// Number of workers (0 = available parallelism)
    pub worker_count: usize,
}

/// Markdown output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    /// Prepend YAML front matter built from metadata
    pub include_frontmatter: bool,

    /// Extension given to files written by directory runs
    pub file_extension: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            include_frontmatter: false,
            file_extension: "md".to_string(),
        }
    }
}
