//! Precedence resolution of masking rules for concrete columns.
//!
//! A column is looked up from most to least specific key:
//!
//! 1. `schema.table.field`
//! 2. `default.table.field`
//! 3. `default.default.field`
//! 4. `default.default.default`
//!
//! and the first rule found applies. No match leaves the column unmasked.

use crate::config::ResolveConfig;
use crate::store::RuleStore;
use pgmask_core::{FunctionReference, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Specificity of the rule that matched a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchLevel {
    /// `schema.table.field`
    Exact,
    /// `default.table.field`
    AnySchema,
    /// `default.default.field`
    AnyTable,
    /// `default.default.default`
    CatchAll,
}

impl MatchLevel {
    /// All levels in lookup order
    pub const ALL: [MatchLevel; 4] = [
        MatchLevel::Exact,
        MatchLevel::AnySchema,
        MatchLevel::AnyTable,
        MatchLevel::CatchAll,
    ];

    /// Composite key probed at this level for the given column
    #[must_use]
    pub fn composite(self, schema: &str, table: &str, field: &str) -> String {
        let (schema, table, field) = match self {
            Self::Exact => (schema, table, field),
            Self::AnySchema => (WILDCARD, table, field),
            Self::AnyTable => (WILDCARD, WILDCARD, field),
            Self::CatchAll => (WILDCARD, WILDCARD, WILDCARD),
        };
        format!("{}.{}.{}", schema, table, field)
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::AnySchema => "any schema",
            Self::AnyTable => "any table",
            Self::CatchAll => "catch-all",
        };
        f.write_str(name)
    }
}

/// Rule chosen for a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Level that matched
    pub level: MatchLevel,
    /// Composite key of the matching rule
    pub key: String,
    /// Function named by the rule, possibly the `default` placeholder
    pub function: &'a FunctionReference,
}

/// Resolves columns against a built rule store
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    store: &'a RuleStore,
    default_function: Option<FunctionReference>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `store`
    #[must_use]
    pub fn new(store: &'a RuleStore) -> Self {
        Self {
            store,
            default_function: None,
        }
    }

    /// Create a resolver using the configured default function
    #[must_use]
    pub fn with_config(store: &'a RuleStore, config: &ResolveConfig) -> Self {
        Self::new(store).with_default_function(config.default_function.clone())
    }

    /// Substitute `function` wherever a rule names `default`
    #[must_use]
    pub fn with_default_function(mut self, function: FunctionReference) -> Self {
        self.default_function = Some(function);
        self
    }

    /// Find the most specific rule for a column
    ///
    /// Names are trimmed and lower-cased before lookup.
    #[must_use]
    pub fn resolve_detailed(&self, schema: &str, table: &str, field: &str) -> Option<Resolution<'a>> {
        let (schema, table, field) = (normalize(schema), normalize(table), normalize(field));

        MatchLevel::ALL.iter().find_map(|&level| {
            let key = level.composite(&schema, &table, &field);
            match self.store.lookup_composite(&key) {
                Some(function) => Some(Resolution {
                    level,
                    key,
                    function,
                }),
                None => {
                    tracing::trace!("No {} rule at {}", level, key);
                    None
                }
            }
        })
    }

    /// Function to apply to a column, with the `default` placeholder
    /// replaced when a default function is set
    #[must_use]
    pub fn resolve(&self, schema: &str, table: &str, field: &str) -> Option<FunctionReference> {
        self.resolve_detailed(schema, table, field)
            .map(|resolution| self.effective_function(&resolution))
    }

    /// Function a resolution applies, with the `default` placeholder
    /// replaced when a default function is set
    #[must_use]
    pub fn effective_function(&self, resolution: &Resolution<'_>) -> FunctionReference {
        match &self.default_function {
            Some(default) if resolution.function.is_default() => default.clone(),
            _ => resolution.function.clone(),
        }
    }
}

/// Function reference for a column, `None` if no rule applies
///
/// A returned `default` placeholder asks the caller to use its own default
/// masking function; see [`resolve_with_default`].
#[must_use]
pub fn resolve(
    store: &RuleStore,
    schema: &str,
    table: &str,
    field: &str,
) -> Option<FunctionReference> {
    Resolver::new(store).resolve(schema, table, field)
}

/// Like [`resolve`], with the `default` placeholder replaced by
/// `default_function`
#[must_use]
pub fn resolve_with_default(
    store: &RuleStore,
    schema: &str,
    table: &str,
    field: &str,
    default_function: &FunctionReference,
) -> Option<FunctionReference> {
    Resolver::new(store)
        .with_default_function(default_function.clone())
        .resolve(schema, table, field)
}
