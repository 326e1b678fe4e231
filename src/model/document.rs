//! Document-level types.

use super::Block;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parsed document: metadata plus ordered blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, author, etc.)
    pub metadata: Metadata,

    /// Content blocks in source order
    pub blocks: Vec<Block>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from blocks.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            metadata: Metadata::default(),
            blocks,
        }
    }

    /// Add a block, skipping blocks without content.
    pub fn push(&mut self, block: Block) {
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    /// Check if the document has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of top-level blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Document metadata.
///
/// Keys are extracted opportunistically; absent keys are simply missing and
/// empty values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value. Whitespace is collapsed; blank values are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let value = value.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
        if value.is_empty() {
            return;
        }
        self.entries.insert(key.into().to_lowercase(), value);
    }

    /// Set a value only if the key is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let key = key.into().to_lowercase();
        if !self.entries.contains_key(&key) {
            self.insert(key, value);
        }
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Document title.
    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    /// Document author.
    pub fn author(&self) -> Option<&str> {
        self.get("author")
    }

    /// Document date, as found in the source.
    pub fn date(&self) -> Option<&str> {
        self.get("date")
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no metadata was extracted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Generate YAML frontmatter for Markdown output.
    pub fn to_yaml_frontmatter(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut lines = vec!["---".to_string()];
        for (key, value) in &self.entries {
            lines.push(format!("{}: \"{}\"", key, escape_yaml(value)));
        }
        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.block_count(), 0);
    }

    #[test]
    fn test_push_skips_empty_blocks() {
        let mut doc = Document::new();
        doc.push(Block::paragraph(vec![]));
        doc.push(Block::paragraph_text("kept"));
        assert_eq!(doc.block_count(), 1);
    }

    #[test]
    fn test_metadata_ignores_blank_values() {
        let mut metadata = Metadata::new();
        metadata.insert("author", "   ");
        metadata.insert("Title", "  Test   Document ");
        assert!(metadata.author().is_none());
        assert_eq!(metadata.title(), Some("Test Document"));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn test_insert_if_absent() {
        let mut metadata = Metadata::new();
        metadata.insert("title", "First");
        metadata.insert_if_absent("title", "Second");
        assert_eq!(metadata.title(), Some("First"));
    }

    #[test]
    fn test_metadata_frontmatter() {
        let mut metadata = Metadata::new();
        metadata.insert("title", "Test \"Document\"");
        metadata.insert("author", "John Doe");

        let yaml = metadata.to_yaml_frontmatter();
        assert_eq!(
            yaml,
            "---\nauthor: \"John Doe\"\ntitle: \"Test \\\"Document\\\"\"\n---\n"
        );
        assert_eq!(Metadata::new().to_yaml_frontmatter(), "");
    }
}
