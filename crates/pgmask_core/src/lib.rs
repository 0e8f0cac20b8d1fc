//! pgmask Core Types
//!
//! Identifiers, rule keys and function references shared by the rule
//! parser and its consumers. This crate does no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod function;
pub mod identifier;
pub mod key;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use function::FunctionReference;
pub use identifier::{Identifier, DEFAULT_MAX_IDENTIFIER_LEN, WILDCARD};
pub use key::RuleKey;
