//! Inline-level types and span normalization.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// An inline span inside a heading, paragraph or list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Inline {
    /// Plain text
    Text(String),
    /// Strong emphasis
    Bold(Vec<Inline>),
    /// Emphasis
    Italic(Vec<Inline>),
}

impl Inline {
    /// Create a text span.
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(text.into())
    }

    /// Create a bold span around plain text.
    pub fn bold(text: impl Into<String>) -> Self {
        Inline::Bold(vec![Inline::Text(text.into())])
    }

    /// Create an italic span around plain text.
    pub fn italic(text: impl Into<String>) -> Self {
        Inline::Italic(vec![Inline::Text(text.into())])
    }

    /// Text content without any emphasis.
    pub fn plain_text(&self) -> String {
        match self {
            Inline::Text(t) => t.clone(),
            Inline::Bold(children) | Inline::Italic(children) => plain_text(children),
        }
    }
}

/// Concatenated text of a span sequence.
pub fn plain_text(spans: &[Inline]) -> String {
    spans.iter().map(Inline::plain_text).collect()
}

/// Append text to a span sequence, merging with a trailing text span.
pub fn push_text(spans: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = spans.last_mut() {
        last.push_str(text);
    } else {
        spans.push(Inline::Text(text.to_string()));
    }
}

/// Emphasis kinds tracked while building spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    /// `b` / `strong` / `**`
    Bold,
    /// `i` / `em` / `*`
    Italic,
}

impl Emphasis {
    fn wrap(self, children: Vec<Inline>) -> Inline {
        match self {
            Emphasis::Bold => Inline::Bold(children),
            Emphasis::Italic => Inline::Italic(children),
        }
    }
}

/// Incremental builder for inline spans with open/close emphasis.
///
/// Closing an emphasis that is not on top of the stack closes everything
/// above it first, so misnested markup still yields a tree.
#[derive(Debug, Default)]
pub struct InlineBuilder {
    root: Vec<Inline>,
    frames: Vec<(Emphasis, Vec<Inline>)>,
}

impl InlineBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Vec<Inline> {
        match self.frames.last_mut() {
            Some((_, spans)) => spans,
            None => &mut self.root,
        }
    }

    /// Append text to the innermost open span.
    pub fn text(&mut self, text: &str) {
        push_text(self.current(), text);
    }

    /// Open an emphasis span.
    pub fn open(&mut self, emphasis: Emphasis) {
        self.frames.push((emphasis, Vec::new()));
    }

    /// Close the innermost open span of the given kind.
    ///
    /// Returns `false` if the close was not well nested (either nothing of
    /// that kind was open, or other spans had to be closed implicitly).
    pub fn close(&mut self, emphasis: Emphasis) -> bool {
        let Some(pos) = self.frames.iter().rposition(|(kind, _)| *kind == emphasis) else {
            return false;
        };
        let well_nested = pos + 1 == self.frames.len();
        while self.frames.len() > pos {
            if let Some((kind, spans)) = self.frames.pop() {
                let wrapped = kind.wrap(spans);
                self.current().push(wrapped);
            }
        }
        well_nested
    }

    /// Whether any emphasis is still open.
    pub fn has_open(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Whether nothing but whitespace has been collected.
    pub fn is_blank(&self) -> bool {
        plain_text(&self.root).trim().is_empty()
            && self
                .frames
                .iter()
                .all(|(_, spans)| plain_text(spans).trim().is_empty())
    }

    /// Take the collected spans, normalized.
    ///
    /// Open emphasis is closed for the returned spans and reopened (empty)
    /// so that text following a block boundary keeps its styling.
    pub fn take(&mut self) -> Vec<Inline> {
        let kinds: Vec<Emphasis> = self.frames.iter().map(|(kind, _)| *kind).collect();
        while let Some((kind, spans)) = self.frames.pop() {
            let wrapped = kind.wrap(spans);
            self.current().push(wrapped);
        }
        let spans = std::mem::take(&mut self.root);
        for kind in kinds {
            self.open(kind);
        }
        normalize_inlines(spans)
    }
}

/// Normalize spans to their canonical form.
///
/// Text is NFC-normalized, whitespace runs collapse to a single space
/// (including across span boundaries), leading and trailing whitespace is
/// trimmed, whitespace at emphasis edges is moved outside the emphasis,
/// empty spans are dropped and adjacent text spans are merged.
pub fn normalize_inlines(spans: Vec<Inline>) -> Vec<Inline> {
    let mut last_space = true;
    let collapsed = collapse(spans, &mut last_space);
    let mut hoisted = hoist(collapsed);
    trim_end(&mut hoisted);
    hoisted
}

fn collapse(spans: Vec<Inline>, last_space: &mut bool) -> Vec<Inline> {
    spans
        .into_iter()
        .map(|span| match span {
            Inline::Text(text) => {
                let mut out = String::with_capacity(text.len());
                for c in text.nfc() {
                    if c.is_whitespace() {
                        if !*last_space {
                            out.push(' ');
                            *last_space = true;
                        }
                    } else {
                        out.push(c);
                        *last_space = false;
                    }
                }
                Inline::Text(out)
            }
            Inline::Bold(children) => Inline::Bold(collapse(children, last_space)),
            Inline::Italic(children) => Inline::Italic(collapse(children, last_space)),
        })
        .collect()
}

fn hoist(spans: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        match span {
            Inline::Text(text) => push_text(&mut out, &text),
            Inline::Bold(children) => {
                let inner = flatten_same(hoist(children), Emphasis::Bold);
                push_emphasis(&mut out, Emphasis::Bold, inner);
            }
            Inline::Italic(children) => {
                let inner = flatten_same(hoist(children), Emphasis::Italic);
                push_emphasis(&mut out, Emphasis::Italic, inner);
            }
        }
    }
    out
}

fn flatten_same(spans: Vec<Inline>, emphasis: Emphasis) -> Vec<Inline> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        match (span, emphasis) {
            (Inline::Bold(children), Emphasis::Bold)
            | (Inline::Italic(children), Emphasis::Italic) => {
                for child in children {
                    match child {
                        Inline::Text(t) => push_text(&mut out, &t),
                        other => out.push(other),
                    }
                }
            }
            (Inline::Text(t), _) => push_text(&mut out, &t),
            (other, _) => out.push(other),
        }
    }
    out
}

fn push_emphasis(out: &mut Vec<Inline>, emphasis: Emphasis, mut inner: Vec<Inline>) {
    let mut leading = false;
    let mut trailing = false;

    if let Some(Inline::Text(first)) = inner.first_mut() {
        if let Some(rest) = first.strip_prefix(' ') {
            *first = rest.to_string();
            leading = true;
        }
    }
    if let Some(Inline::Text(last)) = inner.last_mut() {
        if let Some(rest) = last.strip_suffix(' ') {
            *last = rest.to_string();
            trailing = true;
        }
    }
    inner.retain(|span| !matches!(span, Inline::Text(t) if t.is_empty()));

    if leading {
        push_text(out, " ");
    }
    if !inner.is_empty() {
        out.push(emphasis.wrap(inner));
    }
    if trailing {
        push_text(out, " ");
    }
}

fn trim_end(spans: &mut Vec<Inline>) {
    while let Some(last) = spans.last_mut() {
        match last {
            Inline::Text(text) => {
                let trimmed_len = text.trim_end().len();
                text.truncate(trimmed_len);
                if text.is_empty() {
                    spans.pop();
                    continue;
                }
            }
            Inline::Bold(children) | Inline::Italic(children) => {
                trim_end(children);
                if children.is_empty() {
                    spans.pop();
                    continue;
                }
            }
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace_across_spans() {
        let spans = vec![
            Inline::text("  hello \n "),
            Inline::Bold(vec![Inline::text("  world ")]),
            Inline::text("  again  "),
        ];
        assert_eq!(
            normalize_inlines(spans),
            vec![
                Inline::text("hello "),
                Inline::bold("world"),
                Inline::text(" again"),
            ]
        );
    }

    #[test]
    fn test_hoist_edge_whitespace() {
        let spans = vec![
            Inline::text("a"),
            Inline::Italic(vec![Inline::text(" b ")]),
            Inline::text("c"),
        ];
        assert_eq!(
            normalize_inlines(spans),
            vec![Inline::text("a "), Inline::italic("b"), Inline::text(" c")]
        );
    }

    #[test]
    fn test_drop_empty_and_merge() {
        let spans = vec![
            Inline::text("a"),
            Inline::Bold(vec![]),
            Inline::Italic(vec![Inline::text("   ")]),
            Inline::text("b"),
        ];
        assert_eq!(normalize_inlines(spans), vec![Inline::text("a b")]);
    }

    #[test]
    fn test_nested_same_emphasis_flattened() {
        let spans = vec![Inline::Bold(vec![
            Inline::text("x "),
            Inline::Bold(vec![Inline::text("y")]),
        ])];
        assert_eq!(normalize_inlines(spans), vec![Inline::bold("x y")]);
    }

    #[test]
    fn test_nfc_normalization() {
        let spans = vec![Inline::text("Cafe\u{301}")];
        assert_eq!(normalize_inlines(spans), vec![Inline::text("Caf\u{e9}")]);
    }

    #[test]
    fn test_builder_misnested_close() {
        let mut builder = InlineBuilder::new();
        builder.open(Emphasis::Bold);
        builder.text("a");
        builder.open(Emphasis::Italic);
        builder.text("b");
        assert!(!builder.close(Emphasis::Bold));
        builder.text("c");
        assert_eq!(
            builder.take(),
            vec![
                Inline::Bold(vec![Inline::text("a"), Inline::italic("b")]),
                Inline::text("c"),
            ]
        );
        assert!(!builder.has_open());
    }

    #[test]
    fn test_builder_take_reopens() {
        let mut builder = InlineBuilder::new();
        builder.open(Emphasis::Italic);
        builder.text("first");
        assert_eq!(builder.take(), vec![Inline::italic("first")]);
        assert!(builder.has_open());
        builder.text("second");
        assert!(builder.close(Emphasis::Italic));
        assert_eq!(builder.take(), vec![Inline::italic("second")]);
    }

    #[test]
    fn test_unmatched_close_is_ignored() {
        let mut builder = InlineBuilder::new();
        builder.text("plain");
        assert!(!builder.close(Emphasis::Bold));
        assert_eq!(builder.take(), vec![Inline::text("plain")]);
    }
}
