//! File and directory processing.
//!
//! A [`SingleFileProcessor`] owns the whole pipeline for one file. A
//! [`DirectoryProcessor`] fans files out to a [`crate::ParallelExecutor`]
//! and collects one [`ProcessingResult`] per file. Use the factory functions
//! to build either from a named profile.

mod directory;
mod factory;
mod result;
mod single;

pub use directory::DirectoryProcessor;
pub use factory::{create_directory_processor, create_processor};
pub use result::{Metrics, ProcessingResult, ResultError};
pub use single::{OutputFormat, SingleFileProcessor};
