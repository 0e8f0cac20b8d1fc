//! pgmask Rule Language
//!
//! Parses masking rule files into a [`RuleStore`] and resolves the masking
//! function for a concrete `schema.table.field` column.
//!
//! ```text
//! public {
//!     users { email: mask_email, ssn: "funcs/ssn.sql" }
//! }
//! default { default { phone: default } }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod function_file;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod store;

// Re-exports
pub use config::{Config, ConfigError, ParserConfig, ResolveConfig, DEFAULT_MASKING_FUNCTION};
pub use error::{ParseError, ParseResult};
pub use function_file::{extract_function_name, FunctionResolver};
pub use lexer::{Lexer, Position, Token};
pub use parser::{parse_rule_file, parse_rule_file_with, parse_rules, ParserState};
pub use report::ErrorReporter;
pub use resolve::{resolve, resolve_with_default, MatchLevel, Resolution, Resolver};
pub use store::{RuleEntry, RuleStore};
