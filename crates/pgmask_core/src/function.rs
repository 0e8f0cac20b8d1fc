//! Masking function references.

use crate::error::{CoreError, CoreResult};
use crate::identifier::{is_invisible, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of a masking function, optionally schema-qualified (`schema.func`)
///
/// Case is preserved as given; the rule lexer has already folded bare names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionReference(String);

impl FunctionReference {
    /// Create a function reference
    ///
    /// # Errors
    ///
    /// Returns error if the reference is empty, has more than one `.`, has
    /// an empty segment or contains whitespace, quotes or structural symbols
    pub fn new(name: &str) -> CoreResult<Self> {
        let name = name.trim();
        let invalid = |reason: &str| CoreError::InvalidFunction {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("empty name"));
        }

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 {
            return Err(invalid("expected name or schema.name"));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment"));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | ':' | ',' | '{' | '}'))
        {
            return Err(invalid("contains reserved character"));
        }
        if name.chars().any(is_invisible) {
            return Err(invalid("contains invisible character"));
        }

        Ok(Self(name.to_string()))
    }

    /// The `default` placeholder, standing for the caller-supplied function
    #[must_use]
    pub fn placeholder() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Check if this is the `default` placeholder
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Schema qualifier, if any
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.0.split_once('.').map(|(schema, _)| schema)
    }

    /// Unqualified function name
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .split_once('.')
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FunctionReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FunctionReference {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<FunctionReference> for String {
    fn from(func: FunctionReference) -> Self {
        func.0
    }
}
