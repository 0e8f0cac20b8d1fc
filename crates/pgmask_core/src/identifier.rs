//! Case-normalized identifiers for schema, table and field names.
//!
//! Identifiers are stored lower-cased and trimmed, matching how an unquoted
//! name is folded by the database. The literal `default` is reserved as the
//! wildcard at any rule key position.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wildcard literal matching any schema, table or field
pub const WILDCARD: &str = "default";

/// Longest identifier accepted unless configured otherwise
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 63;

/// Characters that can never appear inside a bare identifier
const RESERVED: [char; 6] = ['.', '"', ':', ',', '{', '}'];

/// Check for control characters and zero-width or bidi format characters
pub(crate) fn is_invisible(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{00ad}'
                | '\u{200b}'..='\u{200f}'
                | '\u{202a}'..='\u{202e}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{2069}'
                | '\u{feff}'
        )
}

/// A lower-cased, non-empty name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier with the default length limit
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty, too long or contains a reserved
    /// character
    pub fn new(name: &str) -> CoreResult<Self> {
        Self::with_max_len(name, DEFAULT_MAX_IDENTIFIER_LEN)
    }

    /// Create an identifier with an explicit length limit
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty, longer than `max_len` characters
    /// or contains a reserved character
    pub fn with_max_len(name: &str, max_len: usize) -> CoreResult<Self> {
        let normalized = name.trim().to_lowercase();
        let invalid = |reason: String| CoreError::InvalidIdentifier {
            name: name.to_string(),
            reason,
        };

        if normalized.is_empty() {
            return Err(invalid("empty name".to_string()));
        }

        let len = normalized.chars().count();
        if len > max_len {
            return Err(invalid(format!(
                "{} characters exceeds the limit of {}",
                len, max_len
            )));
        }

        if let Some(c) = normalized
            .chars()
            .find(|c| RESERVED.contains(c) || c.is_whitespace())
        {
            return Err(invalid(format!("contains reserved character {:?}", c)));
        }

        if let Some(c) = normalized.chars().find(|&c| is_invisible(c)) {
            return Err(invalid(format!("contains invisible character {:?}", c)));
        }

        Ok(Self(normalized))
    }

    /// The wildcard identifier `default`
    #[must_use]
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Check if this is the wildcard literal
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
