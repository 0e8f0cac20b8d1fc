//! Resolution of rule function values.
//!
//! A bare value names the function directly. A quoted value is a path to a
//! SQL file whose leading statement must be
//! `CREATE [OR REPLACE] FUNCTION <name>`; `<name>` becomes the reference and
//! the path is recorded so the function can be created from the file before
//! the dump runs.

use crate::error::{ParseError, ParseResult};
use crate::lexer::Position;
use indexmap::IndexMap;
use pgmask_core::FunctionReference;
use std::path::{Path, PathBuf};

/// Raw function value from the rule file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionValue<'a> {
    /// Bare, already lower-cased name
    Name(&'a str),
    /// Quoted path, quotes stripped
    Path(&'a str),
}

/// Failure to find a function definition in a SQL file
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// Keyword sequence did not match
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// Expected keyword or name
        expected: &'static str,
        /// Token actually read
        found: String,
    },

    /// Name was read but is not a valid function reference
    #[error("invalid function name: {0}")]
    InvalidName(String),
}

/// Word scanner over SQL text, skipping whitespace and comments
struct SqlScanner<'a> {
    rest: &'a str,
}

impl<'a> SqlScanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self { rest: sql }
    }

    fn skip_trivia(&mut self) {
        loop {
            let trimmed = self.rest.trim_start();
            if let Some(after) = trimmed.strip_prefix("--") {
                self.rest = after.split_once('\n').map_or("", |(_, rest)| rest);
            } else if let Some(after) = trimmed.strip_prefix("/*") {
                self.rest = after.split_once("*/").map_or("", |(_, rest)| rest);
            } else {
                self.rest = trimmed;
                return;
            }
        }
    }

    /// Next word, ending at whitespace, `(` or `;` outside double quotes
    fn next_word(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        if self.rest.is_empty() {
            return None;
        }

        let mut quoted = false;
        let mut end = self.rest.len();
        for (i, c) in self.rest.char_indices() {
            if c == '"' {
                quoted = !quoted;
            } else if !quoted && (c.is_whitespace() || c == '(' || c == ';') {
                end = i;
                break;
            }
        }

        // a lone delimiter is a word of its own
        if end == 0 {
            end = 1;
        }

        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ScanError> {
        match self.next_word() {
            Some(word) if word.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(unexpected(keyword, other)),
        }
    }
}

fn unexpected(expected: &'static str, found: Option<&str>) -> ScanError {
    ScanError::Unexpected {
        expected,
        found: found.map_or_else(|| "end of file".to_string(), |w| format!("{:?}", w)),
    }
}

/// Fold an SQL name: unquoted parts are lower-cased, quoted parts keep case
fn fold_sql_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut quoted = false;
    for c in raw.chars() {
        if c == '"' {
            quoted = !quoted;
        } else if quoted {
            name.push(c);
        } else {
            name.extend(c.to_lowercase());
        }
    }
    name
}

/// Extract `<name>` from a leading `CREATE [OR REPLACE] FUNCTION <name>`
///
/// # Errors
///
/// Returns error if the keyword sequence does not match or the name is not
/// a valid function reference
pub fn extract_function_name(sql: &str) -> Result<FunctionReference, ScanError> {
    let mut scanner = SqlScanner::new(sql);

    scanner.expect_keyword("create")?;
    match scanner.next_word() {
        Some(word) if word.eq_ignore_ascii_case("or") => {
            scanner.expect_keyword("replace")?;
            scanner.expect_keyword("function")?;
        }
        Some(word) if word.eq_ignore_ascii_case("function") => {}
        other => return Err(unexpected("'or replace' or 'function'", other)),
    }

    let raw = match scanner.next_word() {
        Some(word) if word != "(" && word != ";" => word,
        other => return Err(unexpected("function name", other)),
    };

    FunctionReference::new(&fold_sql_name(raw))
        .map_err(|err| ScanError::InvalidName(err.to_string()))
}

/// Resolves function values and remembers every function file it read
pub struct FunctionResolver {
    base_dir: PathBuf,
    max_identifier_len: usize,
    files: IndexMap<PathBuf, FunctionReference>,
}

impl FunctionResolver {
    /// Create a resolver; relative paths are joined onto `base_dir`
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, max_identifier_len: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_identifier_len,
            files: IndexMap::new(),
        }
    }

    /// Resolve a function value read at `position`
    ///
    /// # Errors
    ///
    /// Returns error if a bare name is malformed, a function file cannot be
    /// read, or it holds no function definition
    pub fn resolve(
        &mut self,
        value: FunctionValue<'_>,
        position: Position,
    ) -> ParseResult<FunctionReference> {
        match value {
            FunctionValue::Name(name) => self.resolve_name(name, position),
            FunctionValue::Path(path) => self.resolve_file(path, position),
        }
    }

    fn resolve_name(&self, name: &str, position: Position) -> ParseResult<FunctionReference> {
        let invalid = |reason: String| ParseError::InvalidIdentifier {
            name: name.to_string(),
            reason,
            position,
        };

        let function = FunctionReference::new(name).map_err(|err| invalid(err.to_string()))?;
        if let Some(segment) = name
            .split('.')
            .find(|s| s.chars().count() > self.max_identifier_len)
        {
            return Err(invalid(format!(
                "{:?} exceeds the limit of {} characters",
                segment, self.max_identifier_len
            )));
        }
        Ok(function)
    }

    fn resolve_file(&mut self, raw: &str, position: Position) -> ParseResult<FunctionReference> {
        let path = self.base_dir.join(raw);

        if let Some(function) = self.files.get(&path) {
            return Ok(function.clone());
        }

        if raw.trim().is_empty() {
            return Err(ParseError::FunctionReference {
                path,
                message: "empty function file path".to_string(),
                position,
            });
        }

        let sql = std::fs::read_to_string(&path).map_err(|err| ParseError::Io {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        let function = extract_function_name(&sql).map_err(|err| ParseError::FunctionReference {
            path: path.clone(),
            message: err.to_string(),
            position,
        })?;

        tracing::debug!("Resolved function file {} to {}", path.display(), function);
        self.files.insert(path, function.clone());
        Ok(function)
    }

    /// Function files read so far, in first-reference order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Consume the resolver, returning the function files
    #[must_use]
    pub fn into_files(self) -> Vec<PathBuf> {
        self.files.into_keys().collect()
    }
}
