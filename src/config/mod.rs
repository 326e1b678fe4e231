//! Layered configuration.
//!
//! A [`Config`] is a nested JSON mapping built from a named [`Profile`] with
//! caller overrides deep-merged on top. Overrides may use dotted keys
//! (`converters.html.parser`) or nested objects; they replace only the leaves
//! they name. The merged mapping is deserialized into [`ProcessorConfig`].

mod options;
mod profiles;

pub use options::{
    ConvertersConfig, GeneralOptions, HtmlOptions, MarkdownOptions, OutputOptions,
    ParallelOptions, ParserMode, ProcessorConfig, SecurityOptions, TextOptions, XmlOptions,
};
pub use profiles::Profile;

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// A resolved configuration: the merged mapping and its typed view.
#[derive(Debug, Clone)]
pub struct Config {
    profile: Profile,
    value: Value,
    options: ProcessorConfig,
}

impl Config {
    /// Build the configuration of a named profile.
    pub fn from_profile(profile: Profile) -> Result<Self> {
        let value = profile.base_value()?;
        let options = serde_json::from_value(value.clone())?;
        Ok(Self {
            profile,
            value,
            options,
        })
    }

    /// Build a profile by name.
    pub fn from_profile_name(name: &str) -> Result<Self> {
        Self::from_profile(name.parse()?)
    }

    /// Deep-merge `overrides` over this configuration.
    ///
    /// Fails with [`Error::Config`] if an override path is malformed, descends
    /// into a leaf, names an unknown option, or has the wrong value type.
    pub fn with_overrides(self, overrides: &Value) -> Result<Self> {
        let patch = expand_dotted(overrides)?;
        let value = deep_merge(&self.value, &patch)?;
        let options = serde_json::from_value(value.clone())
            .map_err(|e| Error::Config(format!("invalid override: {}", e)))?;
        Ok(Self {
            profile: self.profile,
            value,
            options,
        })
    }

    /// The profile this configuration started from.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Typed options.
    pub fn options(&self) -> &ProcessorConfig {
        &self.options
    }

    /// The merged mapping.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Look up a value by dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.value, |node, segment| node.get(segment))
    }

    /// Read a JSON override mapping from a file.
    pub fn load_json_file<P: AsRef<Path>>(path: P) -> Result<Value> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Merge `overrides` into `base`, returning a new mapping.
///
/// Objects merge key by key; any other override value replaces the base
/// leaf. An object may not replace a leaf and a leaf may not replace an
/// object.
pub fn deep_merge(base: &Value, overrides: &Value) -> Result<Value> {
    merge_at(base, overrides, "")
}

fn merge_at(base: &Value, overrides: &Value, path: &str) -> Result<Value> {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(over_map)) => {
            let mut merged = base_map.clone();
            for (key, over_value) in over_map {
                let child_path = join_path(path, key);
                let value = match base_map.get(key) {
                    Some(base_value) => merge_at(base_value, over_value, &child_path)?,
                    None => over_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Ok(Value::Object(merged))
        }
        (Value::Object(_), _) => Err(Error::Config(format!(
            "override replaces the section '{}' with a value",
            path
        ))),
        (_, Value::Object(_)) if !path.is_empty() => Err(Error::Config(format!(
            "override path descends into the option '{}'",
            path
        ))),
        (_, value) => Ok(value.clone()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Expand dotted keys into nested objects.
///
/// `{"a.b": 1, "a": {"c.d": 2}}` becomes `{"a": {"b": 1, "c": {"d": 2}}}`.
pub fn expand_dotted(overrides: &Value) -> Result<Value> {
    let Value::Object(map) = overrides else {
        return Err(Error::Config(
            "overrides must be a mapping of option paths".to_string(),
        ));
    };

    let mut root = Value::Object(Map::new());
    for (key, value) in map {
        let segments = parse_path(key)?;
        let value = match value {
            Value::Object(_) => expand_dotted(value)?,
            other => other.clone(),
        };
        let nested = segments
            .iter()
            .rev()
            .fold(value, |acc, segment| {
                let mut map = Map::new();
                map.insert(segment.to_string(), acc);
                Value::Object(map)
            });
        root = deep_merge(&root, &nested)?;
    }
    Ok(root)
}

fn parse_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || s.trim() != *s)
    {
        return Err(Error::Config(format!("malformed option path '{}'", path)));
    }
    Ok(segments)
}

/// Parse a `path=value` assignment.
///
/// The value is read as JSON when possible (`true`, `4`, `["a"]`) and as a
/// plain string otherwise.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("expected path=value, got '{}'", assignment)))?;
    let path = path.trim();
    parse_path(path)?;
    let raw = raw.trim();
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path.to_string(), value))
}
