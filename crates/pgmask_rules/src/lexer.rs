//! Character-level lexer for masking rule files.
//!
//! Bare names are case-folded and may not contain blanks: a blank inside a
//! name is skipped, so `mask email` reads as `maskemail`. Quoted paths are
//! taken verbatim up to the closing quote.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Location in the rule source, both counters 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number
    pub line: usize,
    /// Column number, reset after every newline
    pub column: usize,
}

impl Position {
    /// Create a position
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Structural symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `:`
    Colon,
    /// `,`
    Comma,
}

impl Symbol {
    /// Classify a character as a structural symbol
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '{' => Some(Self::OpenBrace),
            '}' => Some(Self::CloseBrace),
            ':' => Some(Self::Colon),
            ',' => Some(Self::Comma),
            _ => None,
        }
    }

    /// Source character for this symbol
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::OpenBrace => '{',
            Self::CloseBrace => '}',
            Self::Colon => ':',
            Self::Comma => ',',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.as_char())
    }
}

/// Lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Lower-cased bare name
    Ident(String),
    /// Contents of a double-quoted path, quotes stripped
    Quoted(String),
    /// Structural symbol
    Symbol(Symbol),
    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier {:?}", name),
            Self::Quoted(path) => write!(f, "quoted path {:?}", path),
            Self::Symbol(symbol) => write!(f, "{}", symbol),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with the position of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// Where it starts; for end of input, just past the last character
    pub position: Position,
}

impl Spanned {
    /// Create a spanned token
    #[must_use]
    pub fn new(token: Token, position: Position) -> Self {
        Self { token, position }
    }
}

/// Lexical error, turned into a syntax error by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// What the lexer expected
    pub expected: String,
    /// What it found instead
    pub found: String,
    /// Where
    pub position: Position,
}

/// Lexer over an in-memory rule source
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    peeked: Option<Spanned>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer at the start of `source`
    ///
    /// A leading byte order mark is skipped and takes no column.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    /// Position of the next unread character
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Check whether `c` ends an identifier; end of input counts
    #[must_use]
    pub fn is_structural(c: Option<char>) -> bool {
        match c {
            None => true,
            Some(c) => Symbol::from_char(c).is_some(),
        }
    }

    /// Check whether `c` is a separator; end of input counts
    #[must_use]
    pub fn is_blank(c: Option<char>) -> bool {
        matches!(c, None | Some(' ' | '\t' | '\n' | '\r'))
    }

    /// Next character, lower-cased, or `None` at end of input
    ///
    /// Only the first character of a multi-character lowercase mapping is
    /// returned; [`Lexer::read_identifier`] keeps the whole mapping.
    pub fn next_char(&mut self) -> Option<char> {
        self.next_raw()
            .map(|c| c.to_lowercase().next().unwrap_or(c))
    }

    fn next_raw(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_blanks(&mut self) {
        while self.peek_char().is_some() && Self::is_blank(self.peek_char()) {
            self.next_raw();
        }
    }

    /// Read a bare identifier up to the next structural symbol
    ///
    /// Blanks are skipped without being appended. The terminating symbol is
    /// returned but not consumed; `None` means end of input.
    ///
    /// # Errors
    ///
    /// Returns error if a quote appears inside the identifier
    pub fn read_identifier(&mut self) -> Result<(String, Option<Symbol>), LexError> {
        let mut ident = String::new();

        while !Self::is_structural(self.peek_char()) {
            let position = self.position();
            let Some(c) = self.next_raw() else {
                break;
            };
            if Self::is_blank(Some(c)) {
                continue;
            }
            if c == '"' {
                return Err(LexError {
                    expected: "identifier character".to_string(),
                    found: "'\"'".to_string(),
                    position,
                });
            }
            ident.extend(c.to_lowercase());
        }

        let terminator = self.peek_char().and_then(Symbol::from_char);
        Ok((ident, terminator))
    }

    fn read_quoted(&mut self, start: Position) -> Result<Spanned, LexError> {
        // opening quote
        self.next_raw();

        let mut path = String::new();
        loop {
            let position = self.position();
            match self.next_raw() {
                Some('"') => break,
                Some('\n') => {
                    return Err(LexError {
                        expected: "closing '\"'".to_string(),
                        found: "end of line".to_string(),
                        position,
                    });
                }
                None => {
                    return Err(LexError {
                        expected: "closing '\"'".to_string(),
                        found: "end of input".to_string(),
                        position,
                    });
                }
                Some(c) => path.push(c),
            }
        }

        Ok(Spanned::new(Token::Quoted(path), start))
    }

    fn scan_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_blanks();
        let position = self.position();

        let Some(c) = self.peek_char() else {
            return Ok(Spanned::new(Token::Eof, position));
        };

        if c == '"' {
            return self.read_quoted(position);
        }

        if let Some(symbol) = Symbol::from_char(c) {
            self.next_raw();
            return Ok(Spanned::new(Token::Symbol(symbol), position));
        }

        let (ident, _) = self.read_identifier()?;
        Ok(Spanned::new(Token::Ident(ident), position))
    }

    /// Consume and return the next token
    ///
    /// # Errors
    ///
    /// Returns error on a stray quote or an unterminated quoted path
    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan_token(),
        }
    }

    /// Look at the next token without consuming it
    ///
    /// # Errors
    ///
    /// Returns error on a stray quote or an unterminated quoted path
    pub fn peek_token(&mut self) -> Result<&Spanned, LexError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.scan_token()?,
        };
        Ok(self.peeked.insert(token))
    }
}
