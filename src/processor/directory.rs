//! Directory-wide conversion.

use super::result::ProcessingResult;
use super::single::SingleFileProcessor;
use crate::config::ProcessorConfig;
use crate::detect::extension_of;
use crate::error::{Error, Result};
use crate::parallel::{ParallelExecutor, TaskHandle};
use crate::security::{normalize_lexically, Access, SecurityGuard, SymlinkPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::{DirEntry, WalkDir};

/// Converts every matching file below a directory on a worker pool.
#[derive(Debug, Clone)]
pub struct DirectoryProcessor {
    config: Arc<ProcessorConfig>,
    guard: Arc<SecurityGuard>,
    executor: Arc<ParallelExecutor>,
    processor: Arc<SingleFileProcessor>,
}

impl DirectoryProcessor {
    /// Create a directory processor.
    pub fn new(
        config: Arc<ProcessorConfig>,
        guard: Arc<SecurityGuard>,
        executor: Arc<ParallelExecutor>,
        processor: Arc<SingleFileProcessor>,
    ) -> Self {
        Self {
            config,
            guard,
            executor,
            processor,
        }
    }

    /// Create a directory processor sharing a single-file processor's
    /// configuration and guard.
    pub fn from_processor(processor: SingleFileProcessor, executor: Arc<ParallelExecutor>) -> Self {
        Self::new(
            processor.config().clone(),
            processor.guard().clone(),
            executor,
            Arc::new(processor),
        )
    }

    /// The pool tasks are submitted to.
    pub fn executor(&self) -> &Arc<ParallelExecutor> {
        &self.executor
    }

    /// The processor run for each file.
    pub fn processor(&self) -> &Arc<SingleFileProcessor> {
        &self.processor
    }

    /// Convert the files below `input_dir` into `output_dir`, mirroring the
    /// relative layout.
    ///
    /// `file_extensions` filters files by suffix (case-insensitive, with or
    /// without the dot); without it every extension a registered adapter
    /// supports is taken. The outer `Result` reports only failures to
    /// enumerate the input directory itself, which abort before any file is
    /// converted. Per-file failures, including entries the walk cannot
    /// read, are failed results. Results are sorted by relative path.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        output_format: &str,
        recursive: bool,
        file_extensions: Option<&[String]>,
    ) -> Result<Vec<ProcessingResult>> {
        let root = self.guard.validate_path(input_dir, Access::List)?;
        let found = self.enumerate(&root, output_dir, recursive, file_extensions)?;
        log::info!("Found {} files in {}", found.len(), input_dir.display());

        let extension = &self.config.output.file_extension;
        let mut results: Vec<(PathBuf, ProcessingResult)> = Vec::new();
        let mut pending: Vec<(PathBuf, PathBuf, TaskHandle<ProcessingResult>)> =
            Vec::with_capacity(found.len());
        for entry in found {
            let relative = match entry {
                Found::File(relative) => relative,
                Found::Unreadable(relative, err) => {
                    let result = ProcessingResult::from_error(root.join(&relative), &err);
                    results.push((relative, result));
                    continue;
                }
            };
            let input = root.join(&relative);
            let output = output_dir.join(&relative).with_extension(extension);
            let processor = self.processor.clone();
            let format = output_format.to_string();
            let task_input = input.clone();
            let handle = self
                .executor
                .submit(move || processor.process_file(&task_input, &output, &format));
            pending.push((relative, input, handle));
        }

        let timeout = self.config.general.task_timeout_ms.map(Duration::from_millis);
        results.extend(pending.into_iter().map(|(relative, input, handle)| {
            let result = handle.wait(timeout).unwrap_or_else(|e| {
                log::warn!("Task for {} failed: {}", input.display(), e);
                ProcessingResult::from_error(&input, &e)
            });
            (relative, result)
        }));
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let failed = results.iter().filter(|(_, r)| !r.is_success()).count();
        log::info!(
            "Processed {} files: {} succeeded, {} failed",
            results.len(),
            results.len() - failed,
            failed
        );
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }

    /// Entries to convert, sorted by relative path.
    ///
    /// Only a failure on the root itself is an error. An entry below it
    /// that cannot be read is reported as [`Found::Unreadable`] when it
    /// would have been converted, and skipped otherwise.
    fn enumerate(
        &self,
        root: &Path,
        output_dir: &Path,
        recursive: bool,
        file_extensions: Option<&[String]>,
    ) -> Result<Vec<Found>> {
        let max_depth = if recursive {
            self.guard.context().max_depth().max(1)
        } else {
            1
        };
        let skipped = output_locations(output_dir)?;
        let suffixes: Option<Vec<String>> = file_extensions.map(|exts| {
            exts.iter()
                .map(|e| format!(".{}", e.trim().trim_start_matches('.').to_lowercase()))
                .collect()
        });
        let wanted = |path: &Path| match &suffixes {
            Some(suffixes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
            }
            None => extension_of(path)
                .map(|ext| self.processor.registry().supports(&ext))
                .unwrap_or(false),
        };
        let follow_links = self.guard.context().symlink_policy() != SymlinkPolicy::Deny;

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry) && !skipped.iter().any(|s| s == entry.path()));

        let mut found = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let relative = err
                        .path()
                        .filter(|_| err.depth() > 0)
                        .and_then(|p| p.strip_prefix(root).ok())
                        .map(Path::to_path_buf);
                    let Some(relative) = relative else {
                        return Err(err.into());
                    };
                    log::warn!("Cannot read {}: {}", relative.display(), err);
                    if wanted(&relative) {
                        found.push(Found::Unreadable(relative, err.into()));
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() || !wanted(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                found.push(Found::File(relative.to_path_buf()));
            }
        }
        found.sort_by(|a, b| a.relative().cmp(b.relative()));
        Ok(found)
    }
}

/// A walked entry.
#[derive(Debug)]
enum Found {
    File(PathBuf),
    /// Matched but could not be inspected, e.g. a dangling link
    Unreadable(PathBuf, Error),
}

impl Found {
    fn relative(&self) -> &Path {
        match self {
            Found::File(relative) | Found::Unreadable(relative, _) => relative,
        }
    }
}

/// Paths under which the output directory may show up while walking.
fn output_locations(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let absolute = if output_dir.is_absolute() {
        output_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(output_dir)
    };
    let lexical = normalize_lexically(&absolute);
    let mut locations = vec![lexical.clone()];
    if let Ok(canonical) = fs::canonicalize(&lexical) {
        if canonical != lexical {
            locations.push(canonical);
        }
    }
    Ok(locations)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}
