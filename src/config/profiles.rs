//! Named base profiles.

use super::{deep_merge, ProcessorConfig};
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::str::FromStr;

/// A named bundle of default configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Lenient parsing, generous limits
    #[default]
    Standard,
    /// Strict parsing, tight limits, no symlinks, errors propagate
    Strict,
    /// Lenient parsing without metadata, bounded task time
    Fast,
}

impl Profile {
    /// All profiles.
    pub const ALL: [Profile; 3] = [Profile::Standard, Profile::Strict, Profile::Fast];

    /// Profile name as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Standard => "standard",
            Profile::Strict => "strict",
            Profile::Fast => "fast",
        }
    }

    fn patch(&self) -> Value {
        match self {
            Profile::Standard => json!({}),
            Profile::Strict => json!({
                "general": {
                    "propagate_parse_errors": true,
                    "overwrite_existing": false
                },
                "converters": {
                    "html": { "parser": "strict" },
                    "xml": { "parser": "strict" }
                },
                "security": {
                    "max_file_size": 10 * 1024 * 1024,
                    "symlink_policy": "deny",
                    "max_depth": 16
                }
            }),
            Profile::Fast => json!({
                "general": { "task_timeout_ms": 30_000 },
                "converters": {
                    "html": { "extract_metadata": false },
                    "xml": { "extract_metadata": false },
                    "markdown": { "extract_frontmatter": false, "title_from_heading": false }
                }
            }),
        }
    }

    /// The complete mapping for this profile.
    pub fn base_value(&self) -> Result<Value> {
        let defaults = serde_json::to_value(ProcessorConfig::default())?;
        deep_merge(&defaults, &self.patch())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "default" => Ok(Profile::Standard),
            "strict" => Ok(Profile::Strict),
            "fast" => Ok(Profile::Fast),
            other => Err(Error::Config(format!(
                "unknown profile '{}' (expected standard, strict or fast)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ParserMode};
    use crate::security::SymlinkPolicy;

    #[test]
    fn test_profile_names_roundtrip() {
        for profile in Profile::ALL {
            assert_eq!(profile.name().parse::<Profile>().unwrap(), profile);
        }
        assert!("turbo".parse::<Profile>().is_err());
    }

    #[test]
    fn test_every_profile_deserializes() {
        for profile in Profile::ALL {
            assert!(Config::from_profile(profile).is_ok(), "{}", profile);
        }
    }

    #[test]
    fn test_strict_profile_values() {
        let config = Config::from_profile(Profile::Strict).unwrap();
        let options = config.options();
        assert_eq!(options.converters.html.parser, ParserMode::Strict);
        assert_eq!(options.security.symlink_policy, SymlinkPolicy::Deny);
        assert_eq!(options.security.max_file_size, 10 * 1024 * 1024);
        assert!(options.general.propagate_parse_errors);
        // inherited from defaults
        assert_eq!(options.output.file_extension, "md");
    }

    #[test]
    fn test_fast_profile_values() {
        let options = Config::from_profile(Profile::Fast).unwrap().options().clone();
        assert_eq!(options.general.task_timeout_ms, Some(30_000));
        assert!(!options.converters.html.extract_metadata);
        assert_eq!(options.converters.html.parser, ParserMode::Lenient);
    }
}
