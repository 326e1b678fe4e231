//! Conversion of one file.

use super::result::{Attempt, ProcessingResult};
use crate::config::{Config, ProcessorConfig};
use crate::convert::AdapterRegistry;
use crate::detect::{decode_bytes, decode_with_label};
use crate::error::{Error, Result};
use crate::model::Document;
use crate::render::{MarkdownWriter, WriterOptions};
use crate::security::{Access, SecurityContext, SecurityGuard};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Output format for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Markdown format
    #[default]
    Markdown,
}

impl OutputFormat {
    /// File extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(Error::UnsupportedFormat(format!(
                "output format '{}' (only markdown is supported)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => f.write_str("markdown"),
        }
    }
}

/// Converts single files: validate, decode, detect, parse, render, write.
#[derive(Debug, Clone)]
pub struct SingleFileProcessor {
    config: Arc<ProcessorConfig>,
    guard: Arc<SecurityGuard>,
    registry: Arc<AdapterRegistry>,
    writer: MarkdownWriter,
}

impl SingleFileProcessor {
    /// Create a processor from typed options.
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let context = SecurityContext::from_options(&config.security)?;
        let registry = AdapterRegistry::with_config(&config.converters);
        Ok(Self::with_parts(
            Arc::new(config),
            Arc::new(SecurityGuard::new(context)),
            Arc::new(registry),
        ))
    }

    /// Create a processor from a resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.options().clone())
    }

    /// Assemble a processor from shared parts.
    pub fn with_parts(
        config: Arc<ProcessorConfig>,
        guard: Arc<SecurityGuard>,
        registry: Arc<AdapterRegistry>,
    ) -> Self {
        let writer = MarkdownWriter::new(WriterOptions::from(&config.output));
        Self {
            config,
            guard,
            registry,
            writer,
        }
    }

    /// Processor options.
    pub fn config(&self) -> &Arc<ProcessorConfig> {
        &self.config
    }

    /// The guard validating every path.
    pub fn guard(&self) -> &Arc<SecurityGuard> {
        &self.guard
    }

    /// The adapters this processor selects from.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Convert `input` into `output`.
    ///
    /// Never fails: every error becomes a failed [`ProcessingResult`].
    pub fn process_file(&self, input: &Path, output: &Path, output_format: &str) -> ProcessingResult {
        let mut attempt = Attempt::start(input);
        match self.run(input, output, output_format, &mut attempt) {
            Ok(written) => {
                log::debug!("Converted {} -> {}", input.display(), written.display());
                attempt.succeed(written)
            }
            Err(e) => {
                log::warn!("Failed to convert {}: {}", input.display(), e);
                attempt.fail(&e)
            }
        }
    }

    /// Like [`process_file`](Self::process_file), but returns parse errors
    /// as `Err` when `general.propagate_parse_errors` is enabled.
    pub fn try_process_file(
        &self,
        input: &Path,
        output: &Path,
        output_format: &str,
    ) -> Result<ProcessingResult> {
        let mut attempt = Attempt::start(input);
        match self.run(input, output, output_format, &mut attempt) {
            Ok(written) => Ok(attempt.succeed(written)),
            Err(e @ Error::Parse(_)) if self.config.general.propagate_parse_errors => Err(e),
            Err(e) => {
                log::warn!("Failed to convert {}: {}", input.display(), e);
                Ok(attempt.fail(&e))
            }
        }
    }

    /// Parse text into a document, selecting the adapter from the path
    /// hint and the content.
    pub fn parse_content(&self, content: &str, path_hint: Option<&Path>) -> Result<Document> {
        let adapter = self.registry.detect(path_hint, content)?;
        adapter.parse(content)
    }

    /// Convert text to Markdown in memory.
    pub fn convert_content(&self, content: &str, path_hint: Option<&Path>) -> Result<String> {
        let doc = self.parse_content(content, path_hint)?;
        Ok(self.writer.write(&doc))
    }

    fn run(
        &self,
        input: &Path,
        output: &Path,
        output_format: &str,
        attempt: &mut Attempt,
    ) -> Result<PathBuf> {
        let source = self.guard.validate_path(input, Access::Read)?;
        let target = self.guard.validate_path(output, Access::Write)?;
        let format: OutputFormat = output_format.parse()?;

        let overwrite = self.config.general.overwrite_existing;
        if !overwrite && target.exists() {
            return Err(already_exists(&target));
        }

        let bytes = fs::read(&source)?;
        attempt.input_bytes = bytes.len() as u64;
        // the file may have grown since validation
        let limit = self.guard.context().max_file_size();
        if attempt.input_bytes > limit {
            return Err(Error::security(
                input,
                format!("file size {} exceeds limit {}", attempt.input_bytes, limit),
            ));
        }

        let decoded = match &self.config.general.input_encoding {
            Some(label) => decode_with_label(&bytes, label)?,
            None => decode_bytes(&bytes),
        };
        if decoded.had_errors {
            log::warn!(
                "{}: invalid {} sequences were replaced",
                input.display(),
                decoded.encoding
            );
        }

        // The caller's path carries the extension even when a link resolves
        // to a file without one.
        let adapter = self.registry.detect(Some(input), &decoded.text)?;
        attempt.format = Some(adapter.name().to_string());
        let doc = adapter.parse(&decoded.text)?;

        let rendered = match format {
            OutputFormat::Markdown => self.writer.write(&doc),
        };
        write_atomic(&target, rendered.as_bytes(), overwrite)?;
        attempt.output_bytes = rendered.len() as u64;
        Ok(target)
    }
}

fn already_exists(path: &Path) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already exists", path.display()),
    ))
}

/// Write through a temporary file in the destination directory, then
/// rename it into place. The temporary file is removed on any failure.
fn write_atomic(path: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;

    if overwrite {
        file.persist(path).map_err(|e| Error::Io(e.error))?;
    } else {
        file.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                already_exists(path)
            } else {
                Error::Io(e.error)
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn processor_in(dir: &Path, config: ProcessorConfig) -> SingleFileProcessor {
        let context = SecurityContext::new([dir]).unwrap();
        let registry = AdapterRegistry::with_config(&config.converters);
        SingleFileProcessor::with_parts(
            Arc::new(config),
            Arc::new(SecurityGuard::new(context)),
            Arc::new(registry),
        )
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("markdown".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!(matches!(
            "pdf".parse::<OutputFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(OutputFormat::Markdown.extension(), "md");
    }

    #[test]
    fn test_process_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("page.html");
        fs::write(&input, "<h1>Hi</h1><p>there</p>").unwrap();
        let output = dir.path().join("out/page.md");

        let processor = processor_in(dir.path(), ProcessorConfig::default());
        let result = processor.process_file(&input, &output, "markdown");

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(fs::read_to_string(&output).unwrap(), "# Hi\n\nthere\n");
        assert_eq!(result.format(), Some("html"));
        assert_eq!(result.metrics().input_bytes, 23);
        assert_eq!(result.metrics().output_bytes, 12);
    }

    #[test]
    fn test_unsupported_output_format() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        fs::write(&input, "text").unwrap();
        let output = dir.path().join("a.pdf");

        let processor = processor_in(dir.path(), ProcessorConfig::default());
        let result = processor.process_file(&input, &output, "pdf");
        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedFormat));
        assert!(!output.exists());
    }

    #[test]
    fn test_no_overwrite() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        let output = dir.path().join("a.md");
        fs::write(&input, "new").unwrap();
        fs::write(&output, "old").unwrap();

        let mut config = ProcessorConfig::default();
        config.general.overwrite_existing = false;
        let processor = processor_in(dir.path(), config);
        let result = processor.process_file(&input, &output, "md");

        assert_eq!(result.error_kind(), Some(ErrorKind::Io));
        assert!(result.error().unwrap().message.contains("already exists"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "old");
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        fs::write(&input, "text").unwrap();
        // a regular file where the output directory should be
        fs::write(dir.path().join("blocked"), "").unwrap();
        let output = dir.path().join("blocked/a.md");

        let processor = processor_in(dir.path(), ProcessorConfig::default());
        let result = processor.process_file(&input, &output, "md");
        assert_eq!(result.error_kind(), Some(ErrorKind::Io));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_propagate_parse_errors() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.xml");
        fs::write(&input, "<doc><a></b></doc>").unwrap();
        let output = dir.path().join("bad.md");

        let mut config = ProcessorConfig::default();
        config.converters.xml.parser = crate::config::ParserMode::Strict;
        config.general.propagate_parse_errors = true;
        let processor = processor_in(dir.path(), config);

        let result = processor.process_file(&input, &output, "md");
        assert_eq!(result.error_kind(), Some(ErrorKind::Parse));
        assert_eq!(result.format(), Some("xml"));

        let err = processor.try_process_file(&input, &output, "md").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_try_process_file_without_propagation() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.xml");
        fs::write(&input, "<doc><a></b></doc>").unwrap();
        let output = dir.path().join("bad.md");

        let mut config = ProcessorConfig::default();
        config.converters.xml.parser = crate::config::ParserMode::Strict;
        let processor = processor_in(dir.path(), config);

        let result = processor.try_process_file(&input, &output, "md").unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Parse));
    }

    #[test]
    fn test_forced_encoding() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("latin.txt");
        fs::write(&input, b"caf\xe9").unwrap();
        let output = dir.path().join("latin.md");

        let mut config = ProcessorConfig::default();
        config.general.input_encoding = Some("windows-1252".to_string());
        let processor = processor_in(dir.path(), config);
        let result = processor.process_file(&input, &output, "md");

        assert!(result.is_success());
        assert_eq!(fs::read_to_string(&output).unwrap(), "café\n");
    }

    #[test]
    fn test_convert_content() {
        let processor = processor_in(Path::new("."), ProcessorConfig::default());
        let markdown = processor
            .convert_content("<ul><li>a</li><li>b</li></ul>", Some(Path::new("x.html")))
            .unwrap();
        assert_eq!(markdown, "- a\n- b\n");

        let err = processor.convert_content("\0\0", None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
