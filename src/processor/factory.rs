//! Processor construction from profiles.

use super::{DirectoryProcessor, SingleFileProcessor};
use crate::config::Config;
use crate::error::Result;
use crate::parallel::ParallelExecutor;
use serde_json::Value;
use std::sync::Arc;

/// Build a processor from a named profile with overrides merged on top.
///
/// `config_type` is a profile name (`standard`, `strict`, `fast`).
/// `custom_overrides` is a mapping whose keys are dotted option paths or
/// nested sections; pass `Value::Null` or an empty object for none.
///
/// # Example
///
/// ```
/// use docmark::create_processor;
/// use serde_json::json;
///
/// let processor = create_processor("standard", &json!({
///     "converters.html.parser": "strict",
/// }))
/// .unwrap();
/// assert!(processor.config().converters.html.extract_metadata);
/// ```
pub fn create_processor(config_type: &str, custom_overrides: &Value) -> Result<SingleFileProcessor> {
    let config = resolve(config_type, custom_overrides)?;
    log::debug!("Creating processor from profile {}", config.profile());
    SingleFileProcessor::from_config(&config)
}

/// Build a directory processor from a named profile with overrides.
///
/// Runs on the process-wide executor unless `parallel.worker_count` asks
/// for a pool of a specific size.
pub fn create_directory_processor(
    config_type: &str,
    custom_overrides: &Value,
) -> Result<DirectoryProcessor> {
    let config = resolve(config_type, custom_overrides)?;
    let processor = SingleFileProcessor::from_config(&config)?;
    let executor = match config.options().parallel.worker_count {
        0 => ParallelExecutor::global()?,
        _ => Arc::new(ParallelExecutor::from_options(&config.options().parallel)?),
    };
    Ok(DirectoryProcessor::from_processor(processor, executor))
}

fn resolve(config_type: &str, custom_overrides: &Value) -> Result<Config> {
    let config = Config::from_profile_name(config_type)?;
    match custom_overrides {
        Value::Null => Ok(config),
        overrides => config.with_overrides(overrides),
    }
}
