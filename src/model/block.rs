//! Block-level types.

use super::inline::{normalize_inlines, plain_text, Inline};
use serde::{Deserialize, Serialize};

/// A top-level structural block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Section heading
    Heading {
        /// Heading level, always within 1..=6
        level: u8,
        /// Heading text
        content: Vec<Inline>,
    },

    /// Paragraph of inline content
    Paragraph {
        /// Paragraph text
        content: Vec<Inline>,
    },

    /// Ordered or unordered list
    List(List),

    /// Preformatted text, kept verbatim
    CodeBlock {
        /// Raw code text without the trailing newline
        text: String,
    },
}

impl Block {
    /// Create a heading, clamping the level into 1..=6.
    ///
    /// Content is normalized (see [`normalize_inlines`]).
    pub fn heading(level: u8, content: Vec<Inline>) -> Self {
        Block::Heading {
            level: level.clamp(1, 6),
            content: normalize_inlines(content),
        }
    }

    /// Create a heading with plain text.
    pub fn heading_text(level: u8, text: impl Into<String>) -> Self {
        Self::heading(level, vec![Inline::Text(text.into())])
    }

    /// Create a paragraph with normalized content.
    pub fn paragraph(content: Vec<Inline>) -> Self {
        Block::Paragraph {
            content: normalize_inlines(content),
        }
    }

    /// Create a paragraph with plain text.
    pub fn paragraph_text(text: impl Into<String>) -> Self {
        Self::paragraph(vec![Inline::Text(text.into())])
    }

    /// Create a code block.
    pub fn code(text: impl Into<String>) -> Self {
        Block::CodeBlock { text: text.into() }
    }

    /// Plain text content of the block.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { content, .. } | Block::Paragraph { content } => plain_text(content),
            Block::List(list) => list.plain_text(),
            Block::CodeBlock { text } => text.clone(),
        }
    }

    /// Check whether the block carries no visible content.
    pub fn is_empty(&self) -> bool {
        match self {
            Block::Heading { content, .. } | Block::Paragraph { content } => {
                plain_text(content).trim().is_empty()
            }
            Block::List(list) => list.items.is_empty(),
            Block::CodeBlock { text } => text.trim().is_empty(),
        }
    }
}

/// A list with a single ordered/unordered flag for all of its items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    /// Numbered list when true, bulleted otherwise
    pub ordered: bool,

    /// Items in source order
    pub items: Vec<ListItem>,
}

impl List {
    /// Create an empty list.
    pub fn new(ordered: bool) -> Self {
        Self {
            ordered,
            items: Vec::new(),
        }
    }

    /// Create a list of plain-text items.
    pub fn from_texts<I, S>(ordered: bool, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ordered,
            items: texts.into_iter().map(ListItem::text).collect(),
        }
    }

    /// Add an item.
    pub fn push(&mut self, item: ListItem) {
        self.items.push(item);
    }

    /// Total number of items, including nested lists.
    pub fn total_items(&self) -> usize {
        self.items
            .iter()
            .map(|item| 1 + item.children.iter().map(List::total_items).sum::<usize>())
            .sum()
    }

    /// Plain text, one item per line.
    pub fn plain_text(&self) -> String {
        self.items
            .iter()
            .map(ListItem::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A list item: inline content followed by nested lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Item text
    pub content: Vec<Inline>,

    /// Nested lists
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<List>,
}

impl ListItem {
    /// Create an item from spans, normalized.
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            content: normalize_inlines(content),
            children: Vec::new(),
        }
    }

    /// Create an item with plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Inline::Text(text.into())])
    }

    /// Add a nested list.
    pub fn with_child(mut self, list: List) -> Self {
        self.children.push(list);
        self
    }

    /// Append spans to the item content, keeping it normalized.
    pub fn append(&mut self, spans: Vec<Inline>) {
        if spans.is_empty() {
            return;
        }
        let mut content = std::mem::take(&mut self.content);
        if !content.is_empty() {
            content.push(Inline::Text(" ".to_string()));
        }
        content.extend(spans);
        self.content = normalize_inlines(content);
    }

    /// Plain text of the item and its nested lists.
    pub fn plain_text(&self) -> String {
        let mut text = plain_text(&self.content);
        for child in &self.children {
            text.push('\n');
            text.push_str(&child.plain_text());
        }
        text
    }
}
