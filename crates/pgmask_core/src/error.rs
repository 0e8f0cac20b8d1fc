//! Core error types for pgmask.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Identifier is empty, too long or contains a reserved character
    InvalidIdentifier {
        /// Identifier as given
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Composite key does not have exactly three segments
    InvalidKey {
        /// Key as given
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Function reference is not `name` or `schema.name`
    InvalidFunction {
        /// Reference as given
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier { name, reason } => {
                write!(f, "Invalid identifier {:?}: {}", name, reason)
            }
            Self::InvalidKey { key, reason } => write!(f, "Invalid rule key {:?}: {}", key, reason),
            Self::InvalidFunction { name, reason } => {
                write!(f, "Invalid function reference {:?}: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for CoreError {}
