//! Lowering policy knobs.
//!
//! The defaults are pragmatic rather than derived: the tuple arity cap and
//! the missing-combination sample size only bound how much work and output
//! a single match may cause. A driver may override them from a `[lower]`
//! table in its own configuration file.

use std::fmt;

use serde::Deserialize;

/// Default maximum number of scrutinees in a multi-scrutinee match.
pub const DEFAULT_MAX_TUPLE_ARITY: usize = 6;

/// Default number of missing variants/combinations listed in a diagnostic.
pub const DEFAULT_MISSING_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerConfig {
    /// Maximum scrutinee count for tuple matches.
    pub max_tuple_arity: usize,
    /// How many uncovered variants/combinations an exhaustiveness
    /// diagnostic lists before summarizing the rest as a count.
    pub missing_sample_limit: usize,
    /// Type constructors that already store their arguments behind a
    /// pointer. Recursion through one of these does not force boxing.
    pub indirect_containers: Vec<String>,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            max_tuple_arity: DEFAULT_MAX_TUPLE_ARITY,
            missing_sample_limit: DEFAULT_MISSING_SAMPLE_LIMIT,
            indirect_containers: ["Box", "List", "Map", "Set", "Ptr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    lower: LowerConfig,
}

/// Failure to read a `[lower]` configuration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "invalid lowering config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid lowering config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl LowerConfig {
    /// Parse the `[lower]` table of a TOML document. Missing keys (or a
    /// missing table) fall back to the defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(src).map_err(|e| ConfigError::Parse(e.message().to_string()))?;
        file.lower.validate()?;
        Ok(file.lower)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tuple_arity < 2 {
            return Err(ConfigError::Invalid(format!(
                "max_tuple_arity must be at least 2, got {}",
                self.max_tuple_arity
            )));
        }
        if self.missing_sample_limit == 0 {
            return Err(ConfigError::Invalid(
                "missing_sample_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_indirect_container(&self, name: &str) -> bool {
        self.indirect_containers.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LowerConfig::default();
        assert_eq!(config.max_tuple_arity, 6);
        assert_eq!(config.missing_sample_limit, 10);
        assert!(config.is_indirect_container("Box"));
        assert!(!config.is_indirect_container("Option"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(LowerConfig::from_toml_str("").unwrap(), LowerConfig::default());
    }

    #[test]
    fn partial_table_overrides() {
        let config = LowerConfig::from_toml_str("[lower]\nmax_tuple_arity = 3\n").unwrap();
        assert_eq!(config.max_tuple_arity, 3);
        assert_eq!(config.missing_sample_limit, 10);
    }

    #[test]
    fn unknown_key_rejected() {
        let err = LowerConfig::from_toml_str("[lower]\nmax_arity = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn degenerate_arity_rejected() {
        let err = LowerConfig::from_toml_str("[lower]\nmax_tuple_arity = 1\n").unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }
}
