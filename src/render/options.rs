//! Writer options.

use crate::config::OutputOptions;

/// Options for rendering a document to Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Include YAML frontmatter with metadata
    pub include_frontmatter: bool,
}

impl WriterOptions {
    /// Create new writer options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable frontmatter.
    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.include_frontmatter = include;
        self
    }
}

impl From<&OutputOptions> for WriterOptions {
    fn from(options: &OutputOptions) -> Self {
        Self {
            include_frontmatter: options.include_frontmatter,
        }
    }
}
