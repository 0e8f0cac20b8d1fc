//! Masking rule grammar.
//!
//! ```text
//! file        := (schemaBlock ','?)*
//! schemaBlock := IDENT '{' (tableBlock (','? tableBlock)*)? '}'
//! tableBlock  := IDENT '{' (fieldRule (',' fieldRule)*)? '}'
//! fieldRule   := IDENT ':' funcRef
//! funcRef     := IDENT | QUOTED_PATH
//! ```
//!
//! The parser is a state machine driven one token at a time. From the brace
//! depth and whether a table name is pending it always knows which name a
//! bare identifier stands for, so it never backtracks. Any violation ends
//! the parse; a rule file is accepted whole or not at all.

use crate::config::ParserConfig;
use crate::error::{ParseError, ParseResult};
use crate::function_file::{FunctionResolver, FunctionValue};
use crate::lexer::{Lexer, Position, Spanned, Symbol, Token};
use crate::store::RuleStore;
use pgmask_core::{CoreError, FunctionReference, Identifier, RuleKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Parser state, named after what it waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParserState {
    /// Schema name or end of input
    SchemaName,
    /// Table name
    TableName,
    /// Field name
    FieldName,
    /// Function name or quoted function file path
    FunctionName,
    /// `:` between field and function
    WaitColon,
    /// `{` opening a schema or table block
    WaitOpenBrace,
    /// `}` closing an empty block
    WaitCloseBrace,
    /// Separator or close after a rule or a closed block
    WaitComma,
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SchemaName => "schema name",
            Self::TableName => "table name",
            Self::FieldName => "field name",
            Self::FunctionName => "function name",
            Self::WaitColon => "':'",
            Self::WaitOpenBrace => "'{'",
            Self::WaitCloseBrace => "'}'",
            Self::WaitComma => "separator",
        };
        f.write_str(name)
    }
}

/// Deepest block nesting: schema, then table
const FIELD_DEPTH: usize = 2;

/// Mutable state of one parse, never shared between parses
struct ParseContext<'a> {
    lexer: Lexer<'a>,
    config: &'a ParserConfig,
    functions: FunctionResolver,
    store: RuleStore,
    state: ParserState,
    depth: usize,
    closes: usize,
    schema: Option<Identifier>,
    table: Option<Identifier>,
    field: Option<Identifier>,
}

impl<'a> ParseContext<'a> {
    fn new(source: &'a str, config: &'a ParserConfig, base_dir: PathBuf) -> Self {
        Self {
            lexer: Lexer::new(source),
            config,
            functions: FunctionResolver::new(base_dir, config.max_identifier_len),
            store: RuleStore::new(),
            state: ParserState::SchemaName,
            depth: 0,
            closes: 0,
            schema: None,
            table: None,
            field: None,
        }
    }

    fn run(mut self) -> ParseResult<RuleStore> {
        loop {
            let spanned = self
                .lexer
                .next_token()
                .map_err(|err| ParseError::from_lex(err, self.state))?;
            if self.step(spanned)? {
                break;
            }
        }

        let Self {
            functions,
            mut store,
            ..
        } = self;
        for path in functions.into_files() {
            store.record_function_file(&path);
        }
        Ok(store)
    }

    /// Apply one token; returns true once the input is accepted
    fn step(&mut self, spanned: Spanned) -> ParseResult<bool> {
        let Spanned { token, position } = spanned;

        if token == Token::Eof {
            return self.finish(position).map(|()| true);
        }
        if token != Token::Symbol(Symbol::CloseBrace) {
            self.closes = 0;
        }

        match (self.state, token) {
            (ParserState::SchemaName, Token::Ident(name)) => {
                self.schema = Some(self.identifier(&name, position)?);
                self.table = None;
                self.state = ParserState::WaitOpenBrace;
            }
            (ParserState::TableName, Token::Ident(name)) => {
                self.table = Some(self.identifier(&name, position)?);
                self.state = ParserState::WaitOpenBrace;
            }
            (ParserState::FieldName, Token::Ident(name)) => {
                self.field = Some(self.identifier(&name, position)?);
                self.state = ParserState::WaitColon;
            }
            (ParserState::WaitColon, Token::Symbol(Symbol::Colon)) => {
                self.state = ParserState::FunctionName;
            }
            (ParserState::WaitOpenBrace, Token::Symbol(Symbol::OpenBrace)) => {
                self.depth += 1;
                self.state = if self.table.is_some() {
                    ParserState::FieldName
                } else {
                    ParserState::TableName
                };
                if matches!(self.peek()?.token, Token::Symbol(Symbol::CloseBrace)) {
                    self.state = ParserState::WaitCloseBrace;
                }
            }
            (ParserState::FunctionName, Token::Ident(name)) => {
                let function = self.functions.resolve(FunctionValue::Name(&name), position)?;
                self.add_rule(function, position)?;
            }
            (ParserState::FunctionName, Token::Quoted(path)) => {
                let function = self.functions.resolve(FunctionValue::Path(&path), position)?;
                self.add_rule(function, position)?;
            }
            (ParserState::WaitCloseBrace, Token::Symbol(Symbol::CloseBrace)) => {
                self.close_block();
            }
            (ParserState::WaitComma, token) => self.after_rule_or_block(token, position)?,
            (_, token) => return Err(self.unexpected(&token, position)),
        }

        Ok(false)
    }

    fn after_rule_or_block(&mut self, token: Token, position: Position) -> ParseResult<()> {
        match (self.depth, token) {
            (0, Token::Symbol(Symbol::CloseBrace)) => {
                return Err(ParseError::Structural {
                    message: format!("too many '}}' ({} consecutive)", self.closes + 1),
                    depth: 0,
                    position,
                });
            }
            (_, Token::Symbol(Symbol::CloseBrace)) => self.close_block(),
            (FIELD_DEPTH, Token::Symbol(Symbol::Comma)) => self.state = ParserState::FieldName,
            (1, Token::Symbol(Symbol::Comma)) => self.state = ParserState::TableName,
            (0, Token::Symbol(Symbol::Comma)) => self.state = ParserState::SchemaName,
            // sibling table without a separating comma
            (1, Token::Ident(name)) => {
                self.table = Some(self.identifier(&name, position)?);
                self.state = ParserState::WaitOpenBrace;
            }
            // sibling schema without a separating comma
            (0, Token::Ident(name)) => {
                self.schema = Some(self.identifier(&name, position)?);
                self.table = None;
                self.state = ParserState::WaitOpenBrace;
            }
            (_, token) => return Err(self.unexpected(&token, position)),
        }
        Ok(())
    }

    fn close_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        match self.depth {
            0 => {
                self.schema = None;
                self.table = None;
            }
            1 => self.table = None,
            _ => {}
        }
        self.field = None;
        self.closes += 1;
        self.state = ParserState::WaitComma;
    }

    fn finish(&self, position: Position) -> ParseResult<()> {
        if self.depth > 0 {
            return Err(ParseError::Structural {
                message: format!(
                    "unexpected end of input, {} unclosed block(s)",
                    self.depth
                ),
                depth: self.depth,
                position,
            });
        }

        match self.state {
            ParserState::SchemaName | ParserState::WaitComma => {
                tracing::info!(
                    "Parsed {} masking rule(s), {} function file(s)",
                    self.store.len(),
                    self.functions.files().count()
                );
                Ok(())
            }
            _ => Err(self.unexpected(&Token::Eof, position)),
        }
    }

    fn add_rule(&mut self, function: FunctionReference, position: Position) -> ParseResult<()> {
        let key = match (&self.schema, &self.table, &self.field) {
            (Some(schema), Some(table), Some(field)) => {
                RuleKey::new(schema.clone(), table.clone(), field.clone())
            }
            _ => {
                return Err(ParseError::Structural {
                    message: "function outside of a table block".to_string(),
                    depth: self.depth,
                    position,
                });
            }
        };

        if self.config.reject_duplicates && self.store.contains(&key) {
            return Err(ParseError::DuplicateRule {
                key: key.composite(),
                position,
            });
        }

        tracing::debug!("Masking rule {} -> {}", key, function);
        self.store.insert(key, function);
        self.field = None;
        self.state = ParserState::WaitComma;
        Ok(())
    }

    fn identifier(&self, name: &str, position: Position) -> ParseResult<Identifier> {
        Identifier::with_max_len(name, self.config.max_identifier_len).map_err(|err| match err {
            CoreError::InvalidIdentifier { reason, .. } => ParseError::InvalidIdentifier {
                name: name.to_string(),
                reason,
                position,
            },
            other => ParseError::InvalidIdentifier {
                name: name.to_string(),
                reason: other.to_string(),
                position,
            },
        })
    }

    fn peek(&mut self) -> ParseResult<&Spanned> {
        let state = self.state;
        self.lexer
            .peek_token()
            .map_err(|err| ParseError::from_lex(err, state))
    }

    fn expected(&self) -> &'static str {
        match (self.state, self.depth) {
            (ParserState::SchemaName, _) => "schema name",
            (ParserState::TableName, _) => "table name",
            (ParserState::FieldName, _) => "field name",
            (ParserState::FunctionName, _) => "function name or quoted function file",
            (ParserState::WaitColon, _) => "':'",
            (ParserState::WaitOpenBrace, _) => "'{'",
            (ParserState::WaitCloseBrace, _) => "'}'",
            (ParserState::WaitComma, FIELD_DEPTH) => "',' or '}'",
            (ParserState::WaitComma, 1) => "',', '}' or table name",
            (ParserState::WaitComma, _) => "',' or schema name",
        }
    }

    fn unexpected(&self, token: &Token, position: Position) -> ParseError {
        ParseError::Syntax {
            expected: self.expected().to_string(),
            found: token.to_string(),
            state: self.state,
            position,
        }
    }
}

/// Parse rules from an in-memory source
///
/// Relative function file paths resolve against
/// `config.function_base_dir`, or the current directory when unset.
///
/// # Errors
///
/// Returns the first syntax, structural, identifier or function file error
pub fn parse_rules(source: &str, config: &ParserConfig) -> ParseResult<RuleStore> {
    let base_dir = config.function_base_dir.clone().unwrap_or_default();
    ParseContext::new(source, config, base_dir).run()
}

/// Parse a rule file with the default configuration
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid rule file
pub fn parse_rule_file(path: impl AsRef<Path>) -> ParseResult<RuleStore> {
    parse_rule_file_with(path, &ParserConfig::default())
}

/// Parse a rule file
///
/// The file is read whole and closed before parsing starts. Relative
/// function file paths resolve against `config.function_base_dir`, or the
/// rule file's directory when unset.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid rule file
pub fn parse_rule_file_with(
    path: impl AsRef<Path>,
    config: &ParserConfig,
) -> ParseResult<RuleStore> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|err| ParseError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    let base_dir = config.function_base_dir.clone().unwrap_or_else(|| {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });

    tracing::debug!("Parsing masking rules from {}", path.display());
    ParseContext::new(&source, config, base_dir).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn parse(source: &str) -> ParseResult<RuleStore> {
        parse_rules(source, &ParserConfig::default())
    }

    fn rules(store: &RuleStore) -> Vec<(String, String)> {
        store
            .iter()
            .map(|e| (e.key.composite(), e.function.to_string()))
            .collect()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(k, f)| (k.to_string(), f.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_single_rule() {
        let store = parse("public { users { email: mask_email } }").unwrap();
        assert_eq!(rules(&store), pairs(&[("public.users.email", "mask_email")]));
    }

    #[test]
    fn test_parse_case_insensitive() {
        let upper = parse("Public{Users{Email:anon}}").unwrap();
        let lower = parse("public{users{email:anon}}").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_parse_siblings() {
        let store = parse(
            "public {
                users { email: a, phone: b },
                orders { total: c }
                audit { who: d }
            },
            billing { cards { number: e } }
            archive { old { x: f } }",
        )
        .unwrap();

        assert_eq!(
            rules(&store),
            pairs(&[
                ("public.users.email", "a"),
                ("public.users.phone", "b"),
                ("public.orders.total", "c"),
                ("public.audit.who", "d"),
                ("billing.cards.number", "e"),
                ("archive.old.x", "f"),
            ])
        );
    }

    #[test]
    fn test_parse_empty_blocks() {
        let store = parse("public { orders { }, users { id: x } } empty { }").unwrap();
        assert_eq!(rules(&store), pairs(&[("public.users.id", "x")]));
    }

    #[test]
    fn test_parse_qualified_function() {
        let store = parse("default { default { ssn: Masks.SSN } }").unwrap();
        assert_eq!(rules(&store), pairs(&[("default.default.ssn", "masks.ssn")]));
    }

    #[test]
    fn test_parse_duplicate_overwrites() {
        let store = parse("s { t { f: one, f: two } } s { t { f: three } }").unwrap();
        assert_eq!(rules(&store), pairs(&[("s.t.f", "three")]));
    }

    #[test]
    fn test_parse_duplicate_rejected_when_strict() {
        let config = ParserConfig::default().strict();
        let err = parse_rules("s { t { f: one,\n f: two } }", &config).unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateRule {
                key: "s.t.f".to_string(),
                position: Position::new(2, 5),
            }
        );
    }

    #[test]
    fn test_parse_unterminated_block() {
        let err = parse("schema { table { field : func }").unwrap_err();
        assert_eq!(
            err,
            ParseError::Structural {
                message: "unexpected end of input, 1 unclosed block(s)".to_string(),
                depth: 1,
                position: Position::new(1, 32),
            }
        );
    }

    #[test]
    fn test_parse_unterminated_on_later_line() {
        let err = parse("s {\n  t {\n    f: g\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Structural {
                depth: 2,
                position: Position { line: 4, column: 1 },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_too_many_closes() {
        let err = parse("s { t { f: g } } }").unwrap_err();
        assert_eq!(
            err,
            ParseError::Structural {
                message: "too many '}' (3 consecutive)".to_string(),
                depth: 0,
                position: Position::new(1, 18),
            }
        );
    }

    #[test]
    fn test_parse_missing_colon() {
        let err = parse("s {\n t { f g } }").unwrap_err();
        // blanks inside a name are skipped, so `f g` reads as `fg`
        assert_eq!(
            err,
            ParseError::Syntax {
                expected: "':'".to_string(),
                found: "'}'".to_string(),
                state: ParserState::WaitColon,
                position: Position::new(2, 10),
            }
        );
    }

    #[test]
    fn test_parse_missing_open_brace() {
        // `s t` reads as the single name `st`, so `f` lands in table position
        let err = parse("s t { f: g }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                state: ParserState::WaitOpenBrace,
                ..
            }
        ));

        let err = parse("s : x").unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                expected: "'{'".to_string(),
                found: "':'".to_string(),
                state: ParserState::WaitOpenBrace,
                position: Position::new(1, 3),
            }
        );
    }

    #[test]
    fn test_parse_trailing_comma() {
        let err = parse("s { t { f: g, } }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                state: ParserState::FieldName,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_byte_order_mark() {
        let store = parse("\u{feff}public { users { email: m } }").unwrap();
        assert_eq!(
            rules(&store),
            vec![("public.users.email".to_string(), "m".to_string())]
        );
        assert_eq!(
            crate::resolve::resolve(&store, "public", "users", "email"),
            Some(FunctionReference::new("m").unwrap())
        );
    }

    #[test]
    fn test_parse_invisible_character_in_name() {
        let err = parse("pub\u{200b}lic { users { email: m } }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidIdentifier {
                position: Position { line: 1, column: 1 },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_nested_too_deep() {
        let err = parse("s { t { f { x: y } } }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                state: ParserState::WaitColon,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_missing_function() {
        let err = parse("s { t { f: } }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                state: ParserState::FunctionName,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_end_of_input_without_block() {
        let err = parse("public").unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                expected: "'{'".to_string(),
                found: "end of input".to_string(),
                state: ParserState::WaitOpenBrace,
                position: Position::new(1, 7),
            }
        );
    }

    #[test]
    fn test_parse_identifier_with_dot_rejected() {
        let err = parse("my.schema { t { f: g } }").unwrap_err();
        assert!(matches!(err, ParseError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_parse_identifier_too_long() {
        let long = "a".repeat(64);
        let err = parse(&format!("s {{ {} {{ f: g }} }}", long)).unwrap_err();
        match err {
            ParseError::InvalidIdentifier { name, position, .. } => {
                assert_eq!(name, long);
                assert_eq!(position, Position::new(1, 5));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let config = ParserConfig {
            max_identifier_len: 100,
            ..ParserConfig::default()
        };
        assert!(parse_rules(&format!("s {{ {} {{ f: g }} }}", long), &config).is_ok());
    }

    #[test]
    fn test_parse_stray_quote_reports_state() {
        let err = parse("s { t\"x { f: g } }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                state: ParserState::TableName,
                position: Position { line: 1, column: 6 },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_function_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("funcs")).unwrap();
        fs::write(
            dir.path().join("funcs/email.sql"),
            "CREATE OR REPLACE FUNCTION mask_email(v text) RETURNS text AS $$ SELECT 'x' $$",
        )
        .unwrap();

        let config = ParserConfig::default().with_function_base_dir(dir.path());
        let store = parse_rules(
            r#"public {
                users { email: "funcs/email.sql" },
                staff { email: "funcs/email.sql" }
            }"#,
            &config,
        )
        .unwrap();

        assert_eq!(
            rules(&store),
            pairs(&[
                ("public.users.email", "mask_email"),
                ("public.staff.email", "mask_email"),
            ])
        );
        assert_eq!(store.function_files(), &[dir.path().join("funcs/email.sql")]);
    }

    #[test]
    fn test_parse_function_file_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.sql"), "DROP TABLE users;").unwrap();

        let config = ParserConfig::default().with_function_base_dir(dir.path());
        let err = parse_rules("s { t { a: ok, b: \"bad.sql\" } }", &config).unwrap_err();
        assert!(matches!(
            err,
            ParseError::FunctionReference {
                position: Position { line: 1, column: 19 },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_rule_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("funcs")).unwrap();
        fs::write(
            dir.path().join("funcs/ssn.sql"),
            "-- social security numbers\nCREATE FUNCTION mask_ssn(v text) RETURNS text",
        )
        .unwrap();
        let rule_path = dir.path().join("masking.rules");
        fs::write(
            &rule_path,
            "public {\n  users { email: mask_email, ssn: \"funcs/ssn.sql\" },\n  orders { }\n}\ndefault { default { phone: default } }\n",
        )
        .unwrap();

        let store = parse_rule_file(&rule_path).unwrap();
        assert_eq!(
            rules(&store),
            pairs(&[
                ("public.users.email", "mask_email"),
                ("public.users.ssn", "mask_ssn"),
                ("default.default.phone", "default"),
            ])
        );
        assert_eq!(store.function_files(), &[dir.path().join("funcs/ssn.sql")]);
    }

    #[test]
    fn test_parse_rule_file_missing() {
        let err = parse_rule_file("/nonexistent/masking.rules").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_parse_state_display() {
        assert_eq!(ParserState::WaitColon.to_string(), "':'");
        assert_eq!(ParserState::SchemaName.to_string(), "schema name");
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,10}".prop_filter("wildcard", |s| s != "default")
    }

    proptest! {
        #[test]
        fn test_parse_entry_count_matches_distinct_keys(
            fields in proptest::collection::vec((name(), name(), name(), name()), 1..20)
        ) {
            let mut source = String::new();
            let mut keys = std::collections::HashSet::new();
            for (schema, table, field, function) in &fields {
                source.push_str(&format!("{} {{ {} {{ {}: {} }} }}\n", schema, table, field, function));
                keys.insert(format!("{}.{}.{}", schema, table, field));
            }

            let store = parse(&source).unwrap();
            prop_assert_eq!(store.len(), keys.len());
        }

        #[test]
        fn test_parse_ignores_case(
            schema in name(), table in name(), field in name(), function in name()
        ) {
            let source = format!("{} {{ {} {{ {}: {} }} }}", schema, table, field, function);
            let upper = parse(&source.to_uppercase()).unwrap();
            let lower = parse(&source).unwrap();
            prop_assert_eq!(upper, lower);
        }
    }
}
