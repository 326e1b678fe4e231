//! Integration tests for the adapter registry.

use docmark::config::{ConvertersConfig, ProcessorConfig};
use docmark::convert::{AdapterRegistry, FormatAdapter, PlainTextAdapter};
use docmark::error::Result;
use docmark::{Block, Document, Error, List, SecurityContext, SecurityGuard, SingleFileProcessor};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Adapter for comma separated values, one list item per row.
struct CsvAdapter;

impl FormatAdapter for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn detect(&self, _path: Option<&Path>, content: &str) -> f32 {
        if content.lines().all(|l| l.contains(',')) {
            0.2
        } else {
            0.0
        }
    }

    fn parse(&self, content: &str) -> Result<Document> {
        let rows = content.lines().map(|l| l.replace(',', " | "));
        Ok(Document::from_blocks(vec![Block::List(List::from_texts(
            false, rows,
        ))]))
    }
}

/// Adapter that claims `.txt` with a different name.
struct ShoutingTextAdapter;

impl FormatAdapter for ShoutingTextAdapter {
    fn name(&self) -> &str {
        "shouting"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn detect(&self, _path: Option<&Path>, _content: &str) -> f32 {
        0.0
    }

    fn parse(&self, content: &str) -> Result<Document> {
        Ok(Document::from_blocks(vec![Block::paragraph_text(
            content.to_uppercase(),
        )]))
    }
}

#[test]
fn test_registry_new_is_empty() {
    let registry = AdapterRegistry::new();
    assert!(registry.is_empty());
    assert!(!registry.supports("txt"));
    assert!(matches!(
        registry.detect(None, "anything"),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn test_registry_with_defaults() {
    let registry = AdapterRegistry::with_config(&ConvertersConfig::default());
    for ext in ["txt", "md", "markdown", "html", "htm", "xml", "HTML", ".xml"] {
        assert!(registry.supports(ext), "{} should be supported", ext);
    }
    assert!(!registry.supports("docx"));
    assert_eq!(registry.get_by_extension("htm").unwrap().name(), "html");
}

#[test]
fn test_register_custom_adapter() {
    let mut registry = AdapterRegistry::with_config(&ConvertersConfig::default());
    registry.register(Arc::new(CsvAdapter));

    assert!(registry.supports("CSV"));
    let adapter = registry.detect(Some(Path::new("data.csv")), "a,b").unwrap();
    assert_eq!(adapter.name(), "csv");

    // unknown extension falls back to content sniffing
    let adapter = registry.detect(Some(Path::new("data")), "a,b\nc,d").unwrap();
    assert_eq!(adapter.name(), "csv");
}

#[test]
fn test_later_registration_replaces_extension() {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(PlainTextAdapter::default()));
    registry.register(Arc::new(ShoutingTextAdapter));

    assert_eq!(registry.get_by_extension("txt").unwrap().name(), "shouting");
    assert_eq!(registry.get_by_name("text").unwrap().name(), "text");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_processor_with_custom_registry() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("prices.csv");
    fs::write(&input, "apple,1\npear,2\n").unwrap();
    let output = dir.path().join("prices.md");

    let mut registry = AdapterRegistry::with_config(&ConvertersConfig::default());
    registry.register(Arc::new(CsvAdapter));
    let processor = SingleFileProcessor::with_parts(
        Arc::new(ProcessorConfig::default()),
        Arc::new(SecurityGuard::new(SecurityContext::new([dir.path()]).unwrap())),
        Arc::new(registry),
    );

    let result = processor.process_file(&input, &output, "markdown");
    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(result.format(), Some("csv"));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "- apple | 1\n- pear | 2\n"
    );
}
