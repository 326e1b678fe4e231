//! Shared block assembly for the markup adapters.

use crate::model::{plain_text, Block, Document, Inline, InlineBuilder, List, ListItem};

/// One open list and its current item.
#[derive(Debug)]
struct ListFrame {
    list: List,
    item: Option<ListItem>,
    /// Element depth that opened an implicit list
    owner: Option<usize>,
}

/// Collects inline text into paragraphs, headings and (nested) lists.
///
/// Text emitted while a list is open goes into its current item.
#[derive(Debug, Default)]
pub(crate) struct BlockBuilder {
    pub doc: Document,
    pub inline: InlineBuilder,
    lists: Vec<ListFrame>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, text: &str) {
        self.inline.text(text);
    }

    /// End the pending paragraph, if any.
    pub fn flush(&mut self) {
        if self.inline.is_blank() {
            return;
        }
        let spans = self.inline.take();
        self.emit_spans(spans);
    }

    pub fn emit_spans(&mut self, spans: Vec<Inline>) {
        if spans.is_empty() {
            return;
        }
        match self.lists.last_mut() {
            Some(frame) => frame.item.get_or_insert_with(ListItem::default).append(spans),
            None => self.doc.push(Block::paragraph(spans)),
        }
    }

    /// Turn the pending text into a heading and return its plain text.
    /// Inside a list the text joins the current item instead.
    pub fn heading(&mut self, level: u8) -> String {
        let spans = self.inline.take();
        let text = plain_text(&spans);
        if self.lists.is_empty() {
            self.doc.push(Block::heading(level, spans));
        } else {
            self.emit_spans(spans);
        }
        text
    }

    pub fn code(&mut self, text: String) {
        if self.lists.is_empty() {
            self.doc.push(Block::code(text));
        } else {
            self.emit_spans(vec![Inline::Text(text)]);
        }
    }

    pub fn open_list(&mut self, ordered: bool) {
        self.flush();
        self.lists.push(ListFrame {
            list: List::new(ordered),
            item: None,
            owner: None,
        });
    }

    /// Open a bulleted list for items that appear outside any list.
    pub fn open_implicit_list(&mut self, owner: usize) {
        self.flush();
        self.lists.push(ListFrame {
            list: List::new(false),
            item: None,
            owner: Some(owner),
        });
    }

    /// Owner depth of the innermost list, if it was opened implicitly.
    pub fn implicit_owner(&self) -> Option<usize> {
        self.lists.last().and_then(|frame| frame.owner)
    }

    pub fn in_list(&self) -> bool {
        !self.lists.is_empty()
    }

    /// Start a new item in the innermost list, closing the previous one.
    pub fn open_item(&mut self) {
        self.flush();
        if self.lists.is_empty() {
            self.open_list(false);
        }
        self.close_item();
        if let Some(frame) = self.lists.last_mut() {
            frame.item = Some(ListItem::default());
        }
    }

    pub fn close_item(&mut self) {
        if let Some(frame) = self.lists.last_mut() {
            if let Some(item) = frame.item.take() {
                frame.list.push(item);
            }
        }
    }

    /// Close the innermost list, nesting it under the enclosing item.
    pub fn close_list(&mut self) {
        self.flush();
        self.close_item();
        let Some(frame) = self.lists.pop() else {
            return;
        };
        if frame.list.items.is_empty() {
            return;
        }
        match self.lists.last_mut() {
            Some(parent) => {
                // a list directly inside a list belongs to the previous item
                if parent.item.is_none() {
                    parent.item = parent.list.items.pop();
                }
                parent
                    .item
                    .get_or_insert_with(ListItem::default)
                    .children
                    .push(frame.list);
            }
            None => self.doc.push(Block::List(frame.list)),
        }
    }

    pub fn finish(mut self) -> Document {
        self.flush();
        while !self.lists.is_empty() {
            self.close_list();
        }
        self.doc
    }
}
