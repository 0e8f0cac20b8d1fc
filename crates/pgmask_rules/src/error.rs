//! Parse errors for masking rule files.

use crate::lexer::{LexError, Position};
use crate::parser::ParserState;
use std::path::PathBuf;

/// Parse result type
pub type ParseResult<T> = Result<T, ParseError>;

/// A fatal rule file error; the parse that raised it produced no rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Rule file or function file cannot be read
    #[error("Cannot read {}: {reason}", .path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        reason: String,
    },

    /// Unexpected token
    #[error("Syntax error at {position}: expected {expected}, found {found}")]
    Syntax {
        /// What the grammar allows here
        expected: String,
        /// What was read
        found: String,
        /// Parser state when the token was read
        state: ParserState,
        /// Where
        position: Position,
    },

    /// Brace nesting mismatch
    #[error("Structural error at {position}: {message} (depth {depth})")]
    Structural {
        /// Description
        message: String,
        /// Open block depth when detected
        depth: usize,
        /// Where
        position: Position,
    },

    /// Quoted function file holds no recognizable function definition
    #[error("Function file {} referenced at {position}: {message}", .path.display())]
    FunctionReference {
        /// Resolved function file path
        path: PathBuf,
        /// What the scanner found instead
        message: String,
        /// Position of the quoted path in the rule file
        position: Position,
    },

    /// Name is too long or malformed
    #[error("Invalid identifier {name:?} at {position}: {reason}")]
    InvalidIdentifier {
        /// Name as read
        name: String,
        /// Why it was rejected
        reason: String,
        /// Where
        position: Position,
    },

    /// Same key defined twice while duplicates are rejected
    #[error("Duplicate rule for {key} at {position}")]
    DuplicateRule {
        /// Composite key
        key: String,
        /// Position of the second definition's function value
        position: Position,
    },
}

impl ParseError {
    /// Wrap a lexical error as a syntax error in the given state
    #[must_use]
    pub fn from_lex(err: LexError, state: ParserState) -> Self {
        Self::Syntax {
            expected: err.expected,
            found: err.found,
            state,
            position: err.position,
        }
    }

    /// Location in the rule file, if the error has one
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Io { .. } => None,
            Self::Syntax { position, .. }
            | Self::Structural { position, .. }
            | Self::FunctionReference { position, .. }
            | Self::InvalidIdentifier { position, .. }
            | Self::DuplicateRule { position, .. } => Some(*position),
        }
    }

    /// Short error class name
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io error",
            Self::Syntax { .. } => "syntax error",
            Self::Structural { .. } => "structural error",
            Self::FunctionReference { .. } => "function reference error",
            Self::InvalidIdentifier { .. } => "invalid identifier",
            Self::DuplicateRule { .. } => "duplicate rule",
        }
    }

    /// Description without the position prefix
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Io { path, reason } => format!("cannot read {}: {}", path.display(), reason),
            Self::Syntax {
                expected, found, ..
            } => format!("expected {}, found {}", expected, found),
            Self::Structural { message, .. } => message.clone(),
            Self::FunctionReference { path, message, .. } => {
                format!("{}: {}", path.display(), message)
            }
            Self::InvalidIdentifier { name, reason, .. } => format!("{:?}: {}", name, reason),
            Self::DuplicateRule { key, .. } => format!("rule for {} is already defined", key),
        }
    }
}
