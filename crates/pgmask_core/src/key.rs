//! Rule keys: the (schema, table, field) identity of a masked column.

use crate::error::{CoreError, CoreResult};
use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between key segments in the composite form
pub const KEY_SEPARATOR: char = '.';

/// Column identity, each segment either a name or the wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    /// Schema name
    pub schema: Identifier,
    /// Table name
    pub table: Identifier,
    /// Field (column) name
    pub field: Identifier,
}

impl RuleKey {
    /// Create a key from its three segments
    #[must_use]
    pub fn new(schema: Identifier, table: Identifier, field: Identifier) -> Self {
        Self {
            schema,
            table,
            field,
        }
    }

    /// Create a key from raw names, normalizing each segment
    ///
    /// # Errors
    ///
    /// Returns error if any segment is not a valid identifier
    pub fn from_names(schema: &str, table: &str, field: &str) -> CoreResult<Self> {
        Ok(Self::new(
            Identifier::new(schema)?,
            Identifier::new(table)?,
            Identifier::new(field)?,
        ))
    }

    /// Parse the composite `schema.table.field` form
    ///
    /// # Errors
    ///
    /// Returns error if there are not exactly three valid segments
    pub fn parse(composite: &str) -> CoreResult<Self> {
        let parts: Vec<&str> = composite.split(KEY_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(CoreError::InvalidKey {
                key: composite.to_string(),
                reason: format!("expected schema.table.field, got {} segment(s)", parts.len()),
            });
        }
        Self::from_names(parts[0], parts[1], parts[2])
    }

    /// Composite dictionary key, segments joined with `.`
    #[must_use]
    pub fn composite(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.schema,
            self.table,
            self.field,
            sep = KEY_SEPARATOR
        )
    }

    /// Check that no segment is the wildcard
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        !(self.schema.is_wildcard() || self.table.is_wildcard() || self.field.is_wildcard())
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite())
    }
}

impl FromStr for RuleKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
