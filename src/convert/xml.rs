//! Generic XML adapter built on quick-xml.
//!
//! There is no fixed schema. Elements are classified by name through
//! [`XmlOptions`]; anything unclassified is walked transparently, and direct
//! text of such an element becomes a paragraph labeled with its name.

use super::builder::BlockBuilder;
use super::{extension_confidence, FormatAdapter};
use crate::config::{ParserMode, XmlOptions};
use crate::detect::content_head;
use crate::error::{Error, Result};
use crate::model::{Block, Document, Emphasis, Inline};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

/// XML to document model.
#[derive(Debug, Clone, Default)]
pub struct XmlAdapter {
    options: XmlOptions,
}

impl XmlAdapter {
    /// Create an adapter with the given options.
    pub fn new(options: XmlOptions) -> Self {
        Self { options }
    }
}

impl FormatAdapter for XmlAdapter {
    fn name(&self) -> &str {
        "xml"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["xml"]
    }

    fn detect(&self, path: Option<&Path>, content: &str) -> f32 {
        if extension_confidence(self, path) == Some(1.0) {
            return 1.0;
        }
        let head = content_head(content, 64);
        if head.starts_with("<?xml") {
            0.9
        } else if head.starts_with('<')
            && head[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            && !head.starts_with("<html")
        {
            0.3
        } else {
            0.0
        }
    }

    fn parse(&self, content: &str) -> Result<Document> {
        let strict = self.options.parser == ParserMode::Strict;
        let mut reader = Reader::from_str(content.trim_start_matches('\u{feff}'));
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = strict;
        config.allow_unmatched_ends = !strict;

        let mut walker = XmlWalker::new(&self.options);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    walker.start(&String::from_utf8_lossy(e.local_name().as_ref()));
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if let Err(message) = walker.end(&name) {
                        if strict {
                            return Err(Error::Parse(message));
                        }
                        log::debug!("Recovered from malformed XML: {}", message);
                    }
                }
                Ok(Event::Text(e)) => walker.text(&String::from_utf8_lossy(e.as_ref())),
                Ok(Event::CData(e)) => walker.text(&String::from_utf8_lossy(&e)),
                Ok(Event::GeneralRef(e)) => {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    match resolve_entity(&entity) {
                        Some(resolved) => walker.text(&resolved),
                        None => walker.text(&format!("&{};", entity)),
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    let message = format!(
                        "malformed XML at byte {}: {}",
                        reader.buffer_position(),
                        e
                    );
                    if strict {
                        return Err(Error::Parse(message));
                    }
                    log::warn!("{}; keeping content parsed so far", message);
                    walker.malformed = true;
                    break;
                }
                _ => {}
            }
        }

        if strict {
            if let Some(open) = walker.stack.last() {
                return Err(Error::Parse(format!(
                    "unexpected end of document, <{}> not closed",
                    open.name
                )));
            }
        }

        let malformed = walker.malformed;
        let doc = walker.finish();
        if malformed && doc.is_empty() && doc.metadata.is_empty() {
            return Err(Error::Parse("no content could be recovered".to_string()));
        }
        log::debug!(
            "XML adapter produced {} blocks, {} metadata entries",
            doc.block_count(),
            doc.metadata.len()
        );
        Ok(doc)
    }
}

/// Predefined XML entities and character references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}

/// What an open element does with its content.
#[derive(Debug, Clone, PartialEq)]
enum Role {
    /// Subtree feeds metadata only
    MetadataContainer,
    /// Text becomes the metadata value under this key
    Metadata(String),
    Heading(u8),
    Code,
    List,
    Item,
    Paragraph,
    /// Standalone emphasis opens its own paragraph
    Emphasis(Emphasis, bool),
    /// Unclassified element inside inline content
    Inline,
    /// Unclassified element in block context; direct text is labeled
    Transparent,
}

#[derive(Debug)]
struct Frame {
    name: String,
    role: Role,
    text: String,
}

struct XmlWalker<'a> {
    options: &'a XmlOptions,
    blocks: BlockBuilder,
    stack: Vec<Frame>,
    code: Option<String>,
    inline_depth: usize,
    metadata_depth: usize,
    skip_depth: usize,
    malformed: bool,
}

impl<'a> XmlWalker<'a> {
    fn new(options: &'a XmlOptions) -> Self {
        Self {
            options,
            blocks: BlockBuilder::new(),
            stack: Vec::new(),
            code: None,
            inline_depth: 0,
            metadata_depth: 0,
            skip_depth: 0,
            malformed: false,
        }
    }

    fn matches(list: &[String], name: &str) -> bool {
        list.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn lookup<'m, V>(map: &'m std::collections::BTreeMap<String, V>, name: &str) -> Option<&'m V> {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    fn classify(&self, name: &str) -> Option<Role> {
        let options = self.options;
        if Self::matches(&options.skip_elements, name) {
            return None;
        }
        if self.metadata_depth > 0 {
            if Self::matches(&options.metadata_containers, name) {
                return Some(Role::MetadataContainer);
            }
            let key = Self::lookup(&options.metadata_elements, name)
                .cloned()
                .unwrap_or_else(|| name.to_lowercase());
            return Some(Role::Metadata(key));
        }
        if Self::matches(&options.metadata_containers, name) {
            return options
                .extract_metadata
                .then_some(Role::MetadataContainer);
        }
        if let Some(key) = Self::lookup(&options.metadata_elements, name) {
            return Some(Role::Metadata(key.clone()));
        }

        let inline = self.inline_depth > 0;
        let role = if let Some(level) = Self::lookup(&options.heading_elements, name) {
            if inline {
                Role::Inline
            } else {
                Role::Heading(*level)
            }
        } else if Self::matches(&options.code_elements, name) {
            if self.code.is_some() {
                Role::Inline
            } else {
                Role::Code
            }
        } else if Self::matches(&options.list_elements, name)
            || Self::matches(&options.ordered_list_elements, name)
        {
            Role::List
        } else if Self::matches(&options.item_elements, name) {
            Role::Item
        } else if Self::matches(&options.paragraph_elements, name) {
            Role::Paragraph
        } else if Self::matches(&options.bold_elements, name) {
            Role::Emphasis(Emphasis::Bold, !inline)
        } else if Self::matches(&options.italic_elements, name) {
            Role::Emphasis(Emphasis::Italic, !inline)
        } else if inline {
            Role::Inline
        } else {
            Role::Transparent
        };
        Some(role)
    }

    fn start(&mut self, name: &str) {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return;
        }

        // direct text seen so far belongs before this child
        if let Some(parent) = self.stack.last_mut() {
            if parent.role == Role::Transparent {
                let text = std::mem::take(&mut parent.text);
                let label = parent.name.clone();
                self.emit_labeled(&label, &text);
            }
        }

        let Some(role) = self.classify(name) else {
            self.skip_depth = 1;
            return;
        };

        if role != Role::Item && self.blocks.implicit_owner() == Some(self.stack.len()) {
            self.blocks.close_list();
        }

        match &role {
            Role::MetadataContainer => self.metadata_depth += 1,
            Role::Metadata(_) | Role::Inline | Role::Transparent => {}
            Role::Heading(_) => {
                self.blocks.flush();
                self.inline_depth += 1;
            }
            Role::Code => {
                if self.inline_depth == 0 {
                    self.blocks.flush();
                }
                self.code = Some(String::new());
            }
            Role::List => {
                let ordered = Self::matches(&self.options.ordered_list_elements, name);
                self.blocks.open_list(ordered);
            }
            Role::Item => {
                if !self.blocks.in_list() {
                    self.blocks.open_implicit_list(self.stack.len());
                }
                self.blocks.open_item();
                self.inline_depth += 1;
            }
            Role::Paragraph => {
                self.blocks.flush();
                self.inline_depth += 1;
            }
            Role::Emphasis(emphasis, standalone) => {
                if *standalone {
                    self.blocks.flush();
                    self.inline_depth += 1;
                }
                self.blocks.inline.open(*emphasis);
            }
        }

        self.stack.push(Frame {
            name: name.to_string(),
            role,
            text: String::new(),
        });
    }

    /// Close `name`, implicitly closing anything opened inside it.
    fn end(&mut self, name: &str) -> std::result::Result<(), String> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }

        let Some(pos) = self
            .stack
            .iter()
            .rposition(|frame| frame.name.eq_ignore_ascii_case(name))
        else {
            return Err(format!("unexpected end tag </{}>", name));
        };

        let mut result = Ok(());
        while self.stack.len() > pos {
            if let Some(frame) = self.stack.pop() {
                if self.stack.len() > pos {
                    result = Err(format!("<{}> not closed before </{}>", frame.name, name));
                }
                self.close(frame);
            }
        }
        result
    }

    fn close(&mut self, frame: Frame) {
        match frame.role {
            Role::MetadataContainer => self.metadata_depth -= 1,
            Role::Metadata(key) => {
                if self.options.extract_metadata {
                    self.blocks.doc.metadata.insert(key, &frame.text);
                }
            }
            Role::Heading(level) => {
                self.inline_depth -= 1;
                let text = self.blocks.heading(level);
                if self.options.extract_metadata && self.is_metadata_key(&frame.name) {
                    self.blocks
                        .doc
                        .metadata
                        .insert_if_absent(frame.name.to_lowercase(), text);
                }
            }
            Role::Code => {
                let code = self.code.take().unwrap_or_default();
                let code = code.strip_prefix('\n').unwrap_or(&code).trim_end().to_string();
                if self.inline_depth > 0 {
                    self.blocks.text(&code);
                } else {
                    self.blocks.code(code);
                }
            }
            Role::List => self.blocks.close_list(),
            Role::Item => {
                self.inline_depth -= 1;
                self.blocks.flush();
                self.blocks.close_item();
            }
            Role::Paragraph => {
                self.inline_depth -= 1;
                self.blocks.flush();
            }
            Role::Emphasis(emphasis, standalone) => {
                self.blocks.inline.close(emphasis);
                if standalone {
                    self.inline_depth -= 1;
                    self.blocks.flush();
                }
            }
            Role::Inline => {}
            Role::Transparent => self.emit_labeled(&frame.name, &frame.text),
        }

        if self
            .blocks
            .implicit_owner()
            .is_some_and(|owner| owner > self.stack.len())
        {
            self.blocks.close_list();
        }
    }

    fn is_metadata_key(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("title")
            || self
                .options
                .metadata_elements
                .values()
                .any(|key| key.eq_ignore_ascii_case(name))
    }

    fn text(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        match top.role {
            Role::Metadata(_) | Role::MetadataContainer | Role::Transparent => {
                top.text.push_str(text)
            }
            _ => self.blocks.text(text),
        }
    }

    /// Emit direct text of an unclassified element as `**name**: text`.
    fn emit_labeled(&mut self, name: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let spans = vec![Inline::bold(name), Inline::text(format!(": {}", text))];
        if self.blocks.in_list() {
            self.blocks.emit_spans(spans);
        } else {
            self.blocks.doc.push(Block::paragraph(spans));
        }
    }

    fn finish(mut self) -> Document {
        while let Some(frame) = self.stack.pop() {
            self.close(frame);
        }
        self.blocks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{List, ListItem};

    const SAMPLE: &str = "<?xml version='1.0' encoding='UTF-8'?>
<root>
  <title>Sample XML Document</title>
  <metadata>
    <author>Test Author</author>
    <date>2025-04-08</date>
  </metadata>
  <content>
    <section>
      <heading>Section 1</heading>
      <paragraph>This is the first section content.</paragraph>
    </section>
    <section>
      <heading>Section 2</heading>
      <paragraph>This is the second section content.</paragraph>
    </section>
  </content>
</root>
";

    fn parse(content: &str) -> Document {
        XmlAdapter::default().parse(content).unwrap()
    }

    #[test]
    fn test_sample_document() {
        let doc = parse(SAMPLE);
        assert_eq!(
            doc.blocks,
            vec![
                Block::heading_text(1, "Sample XML Document"),
                Block::heading_text(2, "Section 1"),
                Block::paragraph_text("This is the first section content."),
                Block::heading_text(2, "Section 2"),
                Block::paragraph_text("This is the second section content."),
            ]
        );
        assert_eq!(doc.metadata.title(), Some("Sample XML Document"));
        assert_eq!(doc.metadata.author(), Some("Test Author"));
        assert_eq!(doc.metadata.date(), Some("2025-04-08"));
    }

    #[test]
    fn test_labeled_paragraphs() {
        let doc = parse("<record><name>Widget</name><price>9.99</price></record>");
        assert_eq!(
            doc.blocks,
            vec![
                Block::paragraph(vec![Inline::bold("name"), Inline::text(": Widget")]),
                Block::paragraph(vec![Inline::bold("price"), Inline::text(": 9.99")]),
            ]
        );
    }

    #[test]
    fn test_lists_and_emphasis() {
        let doc = parse(
            "<doc><para>Some <emphasis>stressed</emphasis> and <b>strong</b> words.</para>\
             <orderedlist><listitem>one<itemizedlist><listitem>inner</listitem></itemizedlist></listitem>\
             <listitem>two</listitem></orderedlist></doc>",
        );
        assert_eq!(
            doc.blocks,
            vec![
                Block::paragraph(vec![
                    Inline::text("Some "),
                    Inline::italic("stressed"),
                    Inline::text(" and "),
                    Inline::bold("strong"),
                    Inline::text(" words."),
                ]),
                Block::List(List {
                    ordered: true,
                    items: vec![
                        ListItem::text("one").with_child(List::from_texts(false, ["inner"])),
                        ListItem::text("two"),
                    ],
                }),
            ]
        );
    }

    #[test]
    fn test_implicit_list_for_bare_items() {
        let doc = parse("<doc><item>a</item><item>b</item><para>after</para></doc>");
        assert_eq!(
            doc.blocks,
            vec![
                Block::List(List::from_texts(false, ["a", "b"])),
                Block::paragraph_text("after"),
            ]
        );
    }

    #[test]
    fn test_code_entities_and_skip() {
        let doc = parse(
            "<doc><programlisting>\nif a &lt; b {\n    go();\n}\n</programlisting>\
             <comment>hidden</comment><p>x &amp; y &#169;</p></doc>",
        );
        assert_eq!(
            doc.blocks,
            vec![
                Block::code("if a < b {\n    go();\n}"),
                Block::paragraph_text("x & y \u{a9}"),
            ]
        );
    }

    #[test]
    fn test_namespaced_names() {
        let doc = parse("<x:doc xmlns:x=\"urn:x\"><x:title>Named</x:title></x:doc>");
        assert_eq!(doc.blocks, vec![Block::heading_text(1, "Named")]);
    }

    #[test]
    fn test_custom_mapping() {
        let options = XmlOptions::default()
            .with_heading("chapter", 2)
            .with_paragraph("note");
        let doc = XmlAdapter::new(options)
            .parse("<book><chapter>Intro</chapter><note>Read me</note></book>")
            .unwrap();
        assert_eq!(
            doc.blocks,
            vec![
                Block::heading_text(2, "Intro"),
                Block::paragraph_text("Read me"),
            ]
        );
    }

    #[test]
    fn test_lenient_recovers() {
        let doc = parse("<doc><p>kept</p><p>also <b>kept</p></doc>");
        assert_eq!(doc.block_count(), 2);

        let doc = parse("<doc><p>before eof</p><p>cut");
        assert_eq!(doc.blocks[0], Block::paragraph_text("before eof"));
    }

    #[test]
    fn test_strict_rejects_malformed() {
        let adapter = XmlAdapter::new(XmlOptions {
            parser: ParserMode::Strict,
            ..XmlOptions::default()
        });
        assert!(matches!(
            adapter.parse("<doc><p>a</x></doc>"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(adapter.parse("<doc><p>a</p>"), Err(Error::Parse(_))));
        assert!(adapter.parse(SAMPLE).is_ok());
    }

    #[test]
    fn test_unrecoverable_is_error() {
        assert!(matches!(
            XmlAdapter::default().parse("<doc"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_detect() {
        let adapter = XmlAdapter::default();
        assert_eq!(adapter.detect(Some(Path::new("feed.xml")), ""), 1.0);
        assert_eq!(adapter.detect(None, "<?xml version=\"1.0\"?><a/>"), 0.9);
        assert_eq!(adapter.detect(None, "<catalog><x/></catalog>"), 0.3);
        assert_eq!(adapter.detect(None, "plain"), 0.0);
    }
}
