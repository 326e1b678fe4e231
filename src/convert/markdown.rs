//! Markdown adapter.
//!
//! Re-normalizes markdown through the document model using pulldown-cmark.
//! Structure outside the model (block quotes, links, images, inline code) is
//! reduced to its text.

use super::{extension_confidence, FormatAdapter};
use crate::config::MarkdownOptions;
use crate::error::Result;
use crate::model::{Block, Document, Emphasis, InlineBuilder, List, ListItem, Metadata};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag as CmarkTag, TagEnd};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Markdown to document model.
#[derive(Debug, Clone, Default)]
pub struct MarkdownAdapter {
    options: MarkdownOptions,
}

impl MarkdownAdapter {
    /// Create an adapter with the given options.
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }
}

impl FormatAdapter for MarkdownAdapter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown", "mdown", "mkd"]
    }

    fn detect(&self, path: Option<&Path>, content: &str) -> f32 {
        if extension_confidence(self, path) == Some(1.0) {
            return 1.0;
        }
        static SYNTAX: OnceLock<Regex> = OnceLock::new();
        let syntax = SYNTAX.get_or_init(|| {
            Regex::new(r"(?m)^(#{1,6}[ \t]+\S|[-*+][ \t]+\S|\d{1,9}[.)][ \t]+\S|```)")
                .expect("markdown pattern is valid")
        });
        let head: String = content.chars().take(4096).collect();
        if syntax.is_match(&head) {
            0.6
        } else {
            0.0
        }
    }

    fn parse(&self, content: &str) -> Result<Document> {
        let content = content.trim_start_matches('\u{feff}');
        let (frontmatter, body) = split_frontmatter(content);

        let mut builder = MarkdownBuilder::default();
        for event in CmarkParser::new_ext(body, Options::empty()) {
            builder.handle(event);
        }
        let mut doc = builder.finish();

        if let Some(metadata) = frontmatter {
            if self.options.extract_frontmatter {
                doc.metadata = metadata;
            }
        }
        if self.options.title_from_heading {
            let first_h1 = doc.blocks.iter().find_map(|block| match block {
                Block::Heading { level: 1, .. } => Some(block.plain_text()),
                _ => None,
            });
            if let Some(title) = first_h1 {
                doc.metadata.insert_if_absent("title", title);
            }
        }

        log::debug!(
            "Markdown adapter produced {} blocks, {} metadata entries",
            doc.block_count(),
            doc.metadata.len()
        );
        Ok(doc)
    }
}

/// Split `---` delimited front matter from the body.
///
/// Returns `None` for the metadata when the content has no front matter.
/// Every non-blank line between the delimiters must be a `key: value`
/// pair, otherwise the block is left in the body.
fn split_frontmatter(content: &str) -> (Option<Metadata>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    let mut metadata = Metadata::new();
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return (Some(metadata), &rest[offset..]);
        }
        if trimmed.trim_start().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        match trimmed.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                metadata.insert(key.trim(), unquote_yaml(value.trim()));
            }
            // A thematic break followed by prose, not a metadata block
            _ => return (None, content),
        }
    }
    // No closing delimiter: not front matter
    (None, content)
}

fn unquote_yaml(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].replace("''", "'")
    } else {
        value.to_string()
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Event-driven document builder.
#[derive(Default)]
struct MarkdownBuilder {
    doc: Document,
    inline: InlineBuilder,
    heading: Option<u8>,
    code: Option<String>,
    lists: Vec<List>,
    items: Vec<ListItem>,
}

impl MarkdownBuilder {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(CmarkTag::Heading { level, .. }) => {
                self.flush_item_text();
                self.heading = Some(heading_level(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                let spans = self.inline.take();
                let level = self.heading.take().unwrap_or(1);
                match self.items.last_mut() {
                    Some(item) => item.append(spans),
                    None => self.doc.push(Block::heading(level, spans)),
                }
            }
            Event::Start(CmarkTag::Paragraph) => self.flush_item_text(),
            Event::End(TagEnd::Paragraph) => {
                let spans = self.inline.take();
                match self.items.last_mut() {
                    Some(item) => item.append(spans),
                    None => self.doc.push(Block::paragraph(spans)),
                }
            }
            Event::Start(CmarkTag::List(start)) => {
                self.flush_item_text();
                self.lists.push(List::new(start.is_some()));
            }
            Event::End(TagEnd::List(_)) => {
                if let Some(list) = self.lists.pop() {
                    if list.items.is_empty() {
                        return;
                    }
                    match self.items.last_mut() {
                        Some(parent) => parent.children.push(list),
                        None => self.doc.push(Block::List(list)),
                    }
                }
            }
            Event::Start(CmarkTag::Item) => self.items.push(ListItem::default()),
            Event::End(TagEnd::Item) => {
                self.flush_item_text();
                if let (Some(item), Some(list)) = (self.items.pop(), self.lists.last_mut()) {
                    list.push(item);
                }
            }
            Event::Start(CmarkTag::CodeBlock(_)) => {
                self.flush_item_text();
                self.code = Some(String::new());
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut code) = self.code.take() {
                    if code.ends_with('\n') {
                        code.pop();
                    }
                    match self.items.last_mut() {
                        Some(item) => item.append(vec![crate::model::Inline::Text(code)]),
                        None => self.doc.push(Block::code(code)),
                    }
                }
            }
            Event::Start(CmarkTag::Emphasis) => self.inline.open(Emphasis::Italic),
            Event::End(TagEnd::Emphasis) => {
                self.inline.close(Emphasis::Italic);
            }
            Event::Start(CmarkTag::Strong) => self.inline.open(Emphasis::Bold),
            Event::End(TagEnd::Strong) => {
                self.inline.close(Emphasis::Bold);
            }
            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.push_str(&text),
                None => self.inline.text(&text),
            },
            Event::Code(code) => self.inline.text(&code),
            Event::SoftBreak | Event::HardBreak => self.inline.text(" "),
            // Raw HTML, rules, footnotes and block quote boundaries carry no
            // content of their own.
            _ => {}
        }
    }

    /// Move loose text of a tight list item into the item.
    fn flush_item_text(&mut self) {
        if self.inline.is_blank() {
            return;
        }
        let spans = self.inline.take();
        match self.items.last_mut() {
            Some(item) => item.append(spans),
            None => self.doc.push(Block::paragraph(spans)),
        }
    }

    fn finish(mut self) -> Document {
        self.flush_item_text();
        self.doc
    }
}
