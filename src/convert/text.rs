//! Plain text adapter.

use super::{extension_confidence, FormatAdapter};
use crate::config::TextOptions;
use crate::detect::looks_binary;
use crate::error::Result;
use crate::model::{Block, Document, Inline};

/// Plain text to paragraphs.
///
/// Paragraphs are separated by runs of blank lines; the lines of one
/// paragraph are joined with a space. Markdown syntax in the text is kept
/// literal, never interpreted.
#[derive(Debug, Clone, Default)]
pub struct PlainTextAdapter {
    options: TextOptions,
}

impl PlainTextAdapter {
    /// Create an adapter with the given options.
    pub fn new(options: TextOptions) -> Self {
        Self { options }
    }

    fn flush(lines: &mut Vec<&str>, doc: &mut Document) {
        if lines.is_empty() {
            return;
        }
        let joined = lines.join(" ");
        lines.clear();
        doc.push(Block::paragraph(vec![Inline::text(joined)]));
    }
}

impl FormatAdapter for PlainTextAdapter {
    fn name(&self) -> &str {
        "text"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "text"]
    }

    fn detect(&self, path: Option<&std::path::Path>, content: &str) -> f32 {
        match extension_confidence(self, path) {
            Some(confidence) => confidence,
            None if looks_binary(content) => 0.0,
            None => 0.1,
        }
    }

    fn parse(&self, content: &str) -> Result<Document> {
        let threshold = self.options.paragraph_break_lines.max(1);
        let mut doc = Document::new();
        let mut lines: Vec<&str> = Vec::new();
        let mut blank_run = 0;

        for line in content.trim_start_matches('\u{feff}').lines() {
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run == threshold {
                    Self::flush(&mut lines, &mut doc);
                }
                continue;
            }
            blank_run = 0;
            lines.push(line);
        }
        Self::flush(&mut lines, &mut doc);

        log::debug!("Text adapter produced {} paragraphs", doc.block_count());
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let doc = PlainTextAdapter::default()
            .parse("first line\nsecond  line\n\n\nthird\n")
            .unwrap();
        assert_eq!(
            doc.blocks,
            vec![
                Block::paragraph_text("first line second line"),
                Block::paragraph_text("third"),
            ]
        );
    }

    #[test]
    fn test_configurable_threshold() {
        let adapter = PlainTextAdapter::new(TextOptions::default().with_paragraph_break_lines(2));
        let doc = adapter.parse("a\n\nb\n\n\nc").unwrap();
        assert_eq!(
            doc.blocks,
            vec![Block::paragraph_text("a b"), Block::paragraph_text("c")]
        );
    }

    #[test]
    fn test_markdown_syntax_is_literal() {
        let doc = PlainTextAdapter::default().parse("# not a heading\n- nor a list").unwrap();
        assert_eq!(
            doc.blocks,
            vec![Block::paragraph_text("# not a heading - nor a list")]
        );
    }

    #[test]
    fn test_empty_input() {
        let doc = PlainTextAdapter::default().parse("\n\n  \n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_detect() {
        let adapter = PlainTextAdapter::default();
        assert_eq!(adapter.detect(Some(Path::new("a.TXT")), ""), 1.0);
        assert_eq!(adapter.detect(Some(Path::new("a.html")), "text"), 0.0);
        assert_eq!(adapter.detect(Some(Path::new("LICENSE")), "text"), 0.1);
        assert_eq!(adapter.detect(None, "a\0b"), 0.0);
    }
}
