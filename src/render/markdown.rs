//! Markdown rendering for converted documents.
//!
//! Output is canonical: the same document always renders to the same text,
//! and text that would otherwise be read back as markup is escaped so that
//! parsing the output with [`crate::convert::MarkdownAdapter`] yields the
//! original blocks.

use super::WriterOptions;
use crate::model::{Block, Document, Inline, List};

/// Separates two adjacent lists of the same kind, which CommonMark would
/// otherwise merge into one list.
const LIST_SEPARATOR: &str = "<!-- -->";

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &WriterOptions) -> String {
    MarkdownWriter::new(options.clone()).write(doc)
}

/// Markdown writer.
#[derive(Debug, Clone, Default)]
pub struct MarkdownWriter {
    options: WriterOptions,
}

impl MarkdownWriter {
    /// Create a new Markdown writer.
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    /// Writer options.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Render a document.
    ///
    /// Blocks are separated by exactly one blank line and the output ends
    /// with a single newline. An empty document renders to an empty string.
    pub fn write(&self, doc: &Document) -> String {
        let mut chunks: Vec<String> = Vec::with_capacity(doc.blocks.len());
        let mut previous: Option<&Block> = None;

        for block in doc.blocks.iter().filter(|b| !b.is_empty()) {
            if let (Some(Block::List(prev)), Block::List(list)) = (previous, block) {
                if prev.ordered == list.ordered {
                    chunks.push(LIST_SEPARATOR.to_string());
                }
            }
            chunks.push(self.render_block(block));
            previous = Some(block);
        }

        let mut output = String::new();
        if self.options.include_frontmatter {
            output.push_str(&doc.metadata.to_yaml_frontmatter());
            if !output.is_empty() && !chunks.is_empty() {
                output.push('\n');
            }
        }
        if !chunks.is_empty() {
            output.push_str(&chunks.join("\n\n"));
            output.push('\n');
        }
        output
    }

    fn render_block(&self, block: &Block) -> String {
        match block {
            Block::Heading { level, content } => {
                let level = (*level).clamp(1, 6) as usize;
                format!("{} {}", "#".repeat(level), render_inlines(content, true))
            }
            Block::Paragraph { content } => escape_line_start(render_inlines(content, false)),
            Block::List(list) => {
                let mut lines = Vec::new();
                render_list(list, &mut lines);
                lines.join("\n")
            }
            Block::CodeBlock { text } => render_code(text),
        }
    }
}

fn render_list(list: &List, lines: &mut Vec<String>) {
    for (index, item) in list.items.iter().enumerate() {
        let marker = if list.ordered {
            format!("{}. ", index + 1)
        } else {
            "- ".to_string()
        };

        let content = escape_line_start(render_inlines(&item.content, false));
        if content.is_empty() {
            lines.push(marker.trim_end().to_string());
        } else {
            lines.push(format!("{}{}", marker, content));
        }

        // Nested lists are indented by the parent marker width
        let indent = " ".repeat(marker.len());
        let mut previous: Option<&List> = None;
        for child in &item.children {
            if child.items.is_empty() {
                continue;
            }
            if previous.is_some_and(|p| p.ordered == child.ordered) {
                lines.push(format!("{}{}", indent, LIST_SEPARATOR));
            }
            let mut child_lines = Vec::new();
            render_list(child, &mut child_lines);
            lines.extend(child_lines.into_iter().map(|line| format!("{}{}", indent, line)));
            previous = Some(child);
        }
    }
}

fn render_code(text: &str) -> String {
    let longest_run = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    format!("{fence}\n{text}\n{fence}")
}

fn render_inlines(spans: &[Inline], heading: bool) -> String {
    let mut out = String::new();
    for span in spans {
        render_inline(span, heading, false, &mut out);
    }
    out
}

/// Render one span. `bold_edge` marks an italic span that starts or ends
/// its bold parent.
fn render_inline(span: &Inline, heading: bool, bold_edge: bool, out: &mut String) {
    match span {
        Inline::Text(text) => out.push_str(&escape_text(text, heading)),
        Inline::Bold(children) => {
            out.push_str("**");
            let last = children.len().saturating_sub(1);
            for (index, child) in children.iter().enumerate() {
                render_inline(child, heading, index == 0 || index == last, out);
            }
            out.push_str("**");
        }
        Inline::Italic(children) => {
            // `***` runs are read back as italic wrapping bold, so an italic
            // touching a bold delimiter uses underscores instead.
            let touches_bold = matches!(children.first(), Some(Inline::Bold(_)))
                || matches!(children.last(), Some(Inline::Bold(_)));
            let delimiter = if bold_edge || touches_bold { "_" } else { "*" };
            out.push_str(delimiter);
            for child in children {
                render_inline(child, heading, false, out);
            }
            out.push_str(delimiter);
        }
    }
}

/// Escape characters that are significant anywhere in inline text.
fn escape_text(text: &str, heading: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '&' => {
                result.push('\\');
                result.push(c);
            }
            // A trailing run of `#` would be read as a closing sequence
            '#' if heading => result.push_str("\\#"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape a block marker at the start of a line.
fn escape_line_start(line: String) -> String {
    let Some(first) = line.chars().next() else {
        return line;
    };
    match first {
        '#' | '-' | '+' | '>' | '=' | '~' => format!("\\{}", line),
        '0'..='9' => {
            let digits = line.bytes().take_while(u8::is_ascii_digit).count();
            match line.as_bytes().get(digits) {
                Some(b'.') | Some(b')') => {
                    format!("{}\\{}", &line[..digits], &line[digits..])
                }
                _ => line,
            }
        }
        _ => line,
    }
}
