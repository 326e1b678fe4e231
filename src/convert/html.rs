//! HTML adapter built on the html5ever tokenizer.
//!
//! The token stream is folded straight into the document model. Non-content
//! elements are dropped with their contents, unknown elements are unwrapped.
//! In strict mode tokenizer errors, mismatched end tags and unclosed
//! elements fail the parse; in lenient mode they are tolerated.

use super::builder::BlockBuilder;
use super::{extension_confidence, FormatAdapter};
use crate::config::{HtmlOptions, ParserMode};
use crate::detect::content_head;
use crate::error::{Error, Result};
use crate::model::{Document, Emphasis};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use regex::Regex;
use std::cell::RefCell;
use std::path::Path;
use std::sync::OnceLock;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose end tag may be omitted.
const OPTIONAL_END: &[&str] = &[
    "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot",
    "colgroup", "caption", "rb", "rt", "rp", "html", "head", "body",
];

/// Elements that delimit paragraphs.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "nav", "aside",
    "blockquote", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "dl",
    "dt", "dd", "figure", "figcaption", "form", "fieldset", "legend", "address", "center",
    "hr", "details", "summary", "hgroup", "html", "head", "body",
];

/// Meta names copied into metadata.
const META_NAMES: &[&str] = &["author", "description", "keywords", "date"];

/// HTML to document model.
#[derive(Debug, Clone, Default)]
pub struct HtmlAdapter {
    options: HtmlOptions,
}

impl HtmlAdapter {
    /// Create an adapter with the given options.
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &HtmlOptions {
        &self.options
    }
}

impl FormatAdapter for HtmlAdapter {
    fn name(&self) -> &str {
        "html"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["html", "htm", "xhtml"]
    }

    fn detect(&self, path: Option<&Path>, content: &str) -> f32 {
        if extension_confidence(self, path) == Some(1.0) {
            return 1.0;
        }
        let head = content_head(content, 512);
        if head.starts_with("<!doctype html") || head.starts_with("<html") {
            return 0.9;
        }
        static TAGS: OnceLock<Regex> = OnceLock::new();
        let tags = TAGS.get_or_init(|| {
            Regex::new(r"(?i)<(html|head|body|div|p|span|h[1-6]|ul|ol|li|table|br|b|i|em|strong)[\s>/]")
                .expect("tag pattern is valid")
        });
        if tags.is_match(&head) {
            0.4
        } else {
            0.0
        }
    }

    fn parse(&self, content: &str) -> Result<Document> {
        let sink = HtmlSink {
            options: &self.options,
            state: RefCell::new(HtmlState::default()),
        };
        let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
        let input = BufferQueue::default();
        input.push_back(StrTendril::from_slice(content.trim_start_matches('\u{feff}')));
        let _ = tokenizer.feed(&input);
        tokenizer.end();

        let state = tokenizer.sink.state.take();
        let (doc, errors) = state.finish();

        if self.options.parser == ParserMode::Strict && !errors.is_empty() {
            return Err(Error::Parse(format!(
                "malformed HTML: {}",
                errors.join("; ")
            )));
        }
        if !errors.is_empty() {
            log::debug!("Recovered from {} HTML errors", errors.len());
        }
        log::debug!(
            "HTML adapter produced {} blocks, {} metadata entries",
            doc.block_count(),
            doc.metadata.len()
        );
        Ok(doc)
    }
}

struct HtmlSink<'a> {
    options: &'a HtmlOptions,
    state: RefCell<HtmlState>,
}

impl TokenSink for HtmlSink<'_> {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let mut state = self.state.borrow_mut();
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return state.start_tag(&tag, self.options),
                TagKind::EndTag => state.end_tag(&tag, self.options),
            },
            Token::CharacterTokens(text) => state.text(&text),
            Token::ParseError(message) => state.errors.push(message.into_owned()),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

#[derive(Debug, Default)]
struct HtmlState {
    blocks: BlockBuilder,
    heading: Option<u8>,
    pre: Option<String>,
    skip: Option<(String, usize)>,
    title: Option<String>,
    open: Vec<String>,
    errors: Vec<String>,
}

impl HtmlState {
    fn start_tag(&mut self, tag: &Tag, options: &HtmlOptions) -> TokenSinkResult<()> {
        let name: &str = &tag.name;

        if let Some((skipped, depth)) = self.skip.as_mut() {
            if skipped.as_str() == name && !tag.self_closing {
                *depth += 1;
            }
            return TokenSinkResult::Continue;
        }

        if !tag.self_closing && !VOID_ELEMENTS.contains(&name) {
            self.open.push(name.to_string());
        }

        if options.strip_elements.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            if !tag.self_closing {
                self.skip = Some((name.to_string(), 1));
            }
            return raw_kind(name).map_or(TokenSinkResult::Continue, TokenSinkResult::RawData);
        }

        match name {
            "title" => self.title = Some(String::new()),
            "meta" if options.extract_metadata => self.meta(tag),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.heading = name[1..].parse().ok();
            }
            "b" | "strong" => self.blocks.inline.open(Emphasis::Bold),
            "i" | "em" => self.blocks.inline.open(Emphasis::Italic),
            "br" => self.text(" "),
            "ul" | "ol" => self.blocks.open_list(name == "ol"),
            "li" => self.blocks.open_item(),
            "pre" => {
                self.flush();
                self.pre = Some(String::new());
            }
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush(),
            _ => {}
        }

        raw_kind(name).map_or(TokenSinkResult::Continue, TokenSinkResult::RawData)
    }

    fn end_tag(&mut self, tag: &Tag, options: &HtmlOptions) {
        let name: &str = &tag.name;

        if let Some((skipped, depth)) = self.skip.as_mut() {
            if skipped.as_str() != name {
                return;
            }
            *depth -= 1;
            if *depth > 0 {
                return;
            }
            self.skip = None;
        }

        self.close_element(name);

        match name {
            "title" => {
                if let Some(title) = self.title.take() {
                    if options.extract_metadata {
                        self.blocks.doc.metadata.insert("title", title);
                    }
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.end_heading(),
            "b" | "strong" => self.close_emphasis(Emphasis::Bold, name),
            "i" | "em" => self.close_emphasis(Emphasis::Italic, name),
            "br" => self.text(" "),
            "li" => {
                self.flush();
                self.blocks.close_item();
            }
            "ul" | "ol" => self.blocks.close_list(),
            "pre" => self.end_pre(),
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip.is_some() {
            return;
        }
        if let Some(title) = self.title.as_mut() {
            title.push_str(text);
        } else if let Some(pre) = self.pre.as_mut() {
            pre.push_str(text);
        } else {
            self.blocks.text(text);
        }
    }

    fn meta(&mut self, tag: &Tag) {
        let attr = |wanted: &str| {
            tag.attrs
                .iter()
                .find(|a| (*a.name.local).eq_ignore_ascii_case(wanted))
                .map(|a| a.value.to_string())
        };
        if let (Some(name), Some(content)) = (attr("name"), attr("content")) {
            let key = name.trim().to_lowercase();
            if META_NAMES.contains(&key.as_str()) {
                self.blocks.doc.metadata.insert(key, content);
            }
        }
    }

    /// Track nesting for strict mode.
    fn close_element(&mut self, name: &str) {
        let Some(pos) = self.open.iter().rposition(|open| open == name) else {
            if !VOID_ELEMENTS.contains(&name) {
                self.errors.push(format!("unexpected end tag </{}>", name));
            }
            return;
        };
        for unclosed in self.open.drain(pos + 1..) {
            if !OPTIONAL_END.contains(&unclosed.as_str()) {
                self.errors
                    .push(format!("<{}> not closed before </{}>", unclosed, name));
            }
        }
        self.open.pop();
    }

    fn close_emphasis(&mut self, emphasis: Emphasis, name: &str) {
        if !self.blocks.inline.close(emphasis) {
            log::debug!("Misnested </{}>", name);
        }
    }

    /// Block boundaries inside a heading do not split it.
    fn flush(&mut self) {
        if self.heading.is_none() {
            self.blocks.flush();
        }
    }

    fn end_heading(&mut self) {
        if let Some(level) = self.heading.take() {
            self.blocks.heading(level);
        }
    }

    fn end_pre(&mut self) {
        let Some(text) = self.pre.take() else {
            return;
        };
        let text = text.strip_prefix('\n').unwrap_or(&text);
        let text = text.strip_suffix('\n').unwrap_or(text);
        self.blocks.code(text.to_string());
    }

    fn finish(mut self) -> (Document, Vec<String>) {
        self.skip = None;
        self.title = None;
        self.end_pre();
        self.end_heading();
        for unclosed in &self.open {
            if !OPTIONAL_END.contains(&unclosed.as_str()) {
                self.errors.push(format!("<{}> not closed", unclosed));
            }
        }
        (self.blocks.finish(), self.errors)
    }
}

/// Tokenizer state for elements whose content is not markup.
fn raw_kind(name: &str) -> Option<RawKind> {
    match name {
        "script" => Some(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => Some(RawKind::Rawtext),
        "textarea" | "title" => Some(RawKind::Rcdata),
        _ => None,
    }
}
