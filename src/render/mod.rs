//! Rendering module for converting documents to Markdown.

mod markdown;
mod options;

pub use markdown::{to_markdown, MarkdownWriter};
pub use options::WriterOptions;
