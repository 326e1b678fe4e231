//! Per-file processing outcome.

use crate::error::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Size and timing measurements for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Bytes read from the input
    pub input_bytes: u64,
    /// Bytes written to the output
    pub output_bytes: u64,
    /// Wall time spent on the file
    pub duration_ms: u64,
}

/// Error carried by a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
}

impl From<&Error> for ResultError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of processing one file.
///
/// A result is created once, when the file is done, and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    success: bool,
    error: Option<ResultError>,
    metrics: Metrics,
    format: Option<String>,
    started_at: DateTime<Utc>,
}

impl ProcessingResult {
    /// Failed result for a file that never got to run.
    pub fn from_error(input_path: impl Into<PathBuf>, err: &Error) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            success: false,
            error: Some(err.into()),
            metrics: Metrics::default(),
            format: None,
            started_at: Utc::now(),
        }
    }

    /// Input path as given by the caller.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Output path, present only on success.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Whether the file was converted and written.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Error details of a failed result.
    pub fn error(&self) -> Option<&ResultError> {
        self.error.as_ref()
    }

    /// Error kind of a failed result.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Size and timing measurements.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Name of the adapter that parsed the input, when one was selected.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// When processing started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Collects measurements while a file is processed.
#[derive(Debug)]
pub(crate) struct Attempt {
    input_path: PathBuf,
    started_at: DateTime<Utc>,
    clock: Instant,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub format: Option<String>,
}

impl Attempt {
    pub fn start(input_path: &Path) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            started_at: Utc::now(),
            clock: Instant::now(),
            input_bytes: 0,
            output_bytes: 0,
            format: None,
        }
    }

    fn metrics(&self) -> Metrics {
        Metrics {
            input_bytes: self.input_bytes,
            output_bytes: self.output_bytes,
            duration_ms: self.clock.elapsed().as_millis() as u64,
        }
    }

    pub fn succeed(self, output_path: PathBuf) -> ProcessingResult {
        ProcessingResult {
            metrics: self.metrics(),
            input_path: self.input_path,
            output_path: Some(output_path),
            success: true,
            error: None,
            format: self.format,
            started_at: self.started_at,
        }
    }

    pub fn fail(self, err: &Error) -> ProcessingResult {
        ProcessingResult {
            metrics: self.metrics(),
            input_path: self.input_path,
            output_path: None,
            success: false,
            error: Some(err.into()),
            format: self.format,
            started_at: self.started_at,
        }
    }
}
