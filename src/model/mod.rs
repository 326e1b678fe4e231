//! Document model types for converted content.
//!
//! This module defines the intermediate representation (IR) that bridges
//! format-specific parsing and Markdown rendering. Every adapter produces a
//! [`Document`] and the writer consumes nothing else.

mod block;
mod document;
mod inline;

pub use block::{Block, List, ListItem};
pub use document::{Document, Metadata};
pub use inline::{normalize_inlines, plain_text, push_text, Emphasis, Inline, InlineBuilder};
