//! Human-readable rendering of parse errors with a source excerpt.

use crate::error::ParseError;

/// Renders parse errors against the rule source they came from
#[derive(Debug, Clone)]
pub struct ErrorReporter<'a> {
    origin: String,
    source: &'a str,
}

impl<'a> ErrorReporter<'a> {
    /// Create a reporter for `source`, labelled `origin` (usually the path)
    #[must_use]
    pub fn new(origin: impl Into<String>, source: &'a str) -> Self {
        Self {
            origin: origin.into(),
            source,
        }
    }

    /// Render an error as
    ///
    /// ```text
    /// error: syntax error: expected ':', found '}'
    ///  --> rules.txt:2:17
    ///   |
    /// 2 |   users { email }
    ///   |                 ^
    /// ```
    #[must_use]
    pub fn render(&self, err: &ParseError) -> String {
        let mut out = format!("error: {}: {}\n", err.kind(), err.summary());

        let Some(position) = err.position() else {
            out.push_str(&format!(" --> {}\n", self.origin));
            return out;
        };

        out.push_str(&format!(
            " --> {}:{}:{}\n",
            self.origin, position.line, position.column
        ));

        let Some(line) = self.source.lines().nth(position.line.saturating_sub(1)) else {
            return out;
        };

        let number = position.line.to_string();
        let gutter = " ".repeat(number.len());
        // Tabs are kept so the caret lines up under the same terminal column
        let padding: String = line
            .chars()
            .take(position.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();

        out.push_str(&format!("{} |\n", gutter));
        out.push_str(&format!("{} | {}\n", number, line.trim_end_matches('\r')));
        out.push_str(&format!("{} | {}^\n", gutter, padding));
        out
    }
}
