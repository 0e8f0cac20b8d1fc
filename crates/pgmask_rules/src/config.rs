//! Parser and resolver configuration.

use pgmask_core::{FunctionReference, DEFAULT_MAX_IDENTIFIER_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Function substituted for the `default` placeholder unless configured
pub const DEFAULT_MASKING_FUNCTION: &str = "_masking_function.default";

/// Rule parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Longest accepted identifier, in characters
    pub max_identifier_len: usize,
    /// Reject a second rule for the same key instead of overwriting
    pub reject_duplicates: bool,
    /// Directory relative function file paths are resolved against
    /// (defaults to the rule file's directory)
    pub function_base_dir: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            reject_duplicates: false,
            function_base_dir: None,
        }
    }
}

impl ParserConfig {
    /// Set the function file base directory
    #[must_use]
    pub fn with_function_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.function_base_dir = Some(dir.into());
        self
    }

    /// Reject duplicate keys
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.reject_duplicates = true;
        self
    }
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Function used where a rule names `default`
    pub default_function: FunctionReference,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            default_function: FunctionReference::new(DEFAULT_MASKING_FUNCTION)
                .unwrap_or_else(|_| FunctionReference::placeholder()),
        }
    }
}

/// Combined configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parser settings
    pub parser: ParserConfig,
    /// Resolver settings
    pub resolve: ResolveConfig,
}

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File cannot be read
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid configuration JSON
    #[error("Invalid config {}: {source}", .path.display())]
    Json {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

impl Config {
    /// Load configuration from a JSON file; missing fields take defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
