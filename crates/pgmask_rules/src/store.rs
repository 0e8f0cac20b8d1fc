//! Rule store keyed by composite column identity.

use indexmap::map::Entry;
use indexmap::IndexMap;
use pgmask_core::{FunctionReference, RuleKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single masking rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Column identity, possibly with wildcards
    pub key: RuleKey,
    /// Masking function applied to matching columns
    pub function: FunctionReference,
}

/// Masking rules built from one rule file
///
/// Entries are kept in first-definition order; redefining a key replaces
/// the function in place. Serialized as a list of entries; deserializing
/// re-inserts them, so every map key matches its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRules", into = "StoredRules")]
pub struct RuleStore {
    rules: IndexMap<String, RuleEntry>,
    function_files: Vec<PathBuf>,
}

/// Serialized form of a [`RuleStore`]
#[derive(Serialize, Deserialize)]
struct StoredRules {
    rules: Vec<RuleEntry>,
    #[serde(default)]
    function_files: Vec<PathBuf>,
}

impl From<StoredRules> for RuleStore {
    fn from(stored: StoredRules) -> Self {
        let mut store = Self::new();
        for entry in stored.rules {
            store.insert(entry.key, entry.function);
        }
        for path in &stored.function_files {
            store.record_function_file(path);
        }
        store
    }
}

impl From<RuleStore> for StoredRules {
    fn from(store: RuleStore) -> Self {
        Self {
            rules: store.rules.into_values().collect(),
            function_files: store.function_files,
        }
    }
}

impl RuleStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, returning the function it replaced
    pub fn insert(
        &mut self,
        key: RuleKey,
        function: FunctionReference,
    ) -> Option<FunctionReference> {
        match self.rules.entry(key.composite()) {
            Entry::Occupied(mut occupied) => {
                tracing::warn!(
                    "Rule for {} redefined: {} replaces {}",
                    occupied.key(),
                    function,
                    occupied.get().function
                );
                Some(std::mem::replace(
                    &mut occupied.get_mut().function,
                    function,
                ))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(RuleEntry { key, function });
                None
            }
        }
    }

    /// Exact-match lookup, no wildcard expansion
    #[must_use]
    pub fn lookup(&self, key: &RuleKey) -> Option<&FunctionReference> {
        self.lookup_composite(&key.composite())
    }

    /// Exact-match lookup by composite `schema.table.field` string
    #[must_use]
    pub fn lookup_composite(&self, composite: &str) -> Option<&FunctionReference> {
        self.rules.get(composite).map(|entry| &entry.function)
    }

    /// Check if a rule exists for exactly this key
    #[must_use]
    pub fn contains(&self, key: &RuleKey) -> bool {
        self.rules.contains_key(&key.composite())
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate rules in definition order
    pub fn iter(&self) -> impl Iterator<Item = &RuleEntry> {
        self.rules.values()
    }

    /// Function files to create before dumping, each listed once
    #[must_use]
    pub fn function_files(&self) -> &[PathBuf] {
        &self.function_files
    }

    /// Record a function file, ignoring repeats
    pub fn record_function_file(&mut self, path: &Path) {
        if !self.function_files.iter().any(|known| known == path) {
            self.function_files.push(path.to_path_buf());
        }
    }
}

impl fmt::Display for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (composite, entry) in &self.rules {
            writeln!(f, "{} -> {}", composite, entry.function)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RuleStore {
    type Item = &'a RuleEntry;
    type IntoIter = indexmap::map::Values<'a, String, RuleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(composite: &str) -> RuleKey {
        RuleKey::parse(composite).unwrap()
    }

    fn func(name: &str) -> FunctionReference {
        FunctionReference::new(name).unwrap()
    }

    #[test]
    fn test_store_insert_lookup() {
        let mut store = RuleStore::new();
        assert!(store.is_empty());

        assert_eq!(store.insert(key("public.users.email"), func("mask_email")), None);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.lookup(&key("public.users.email")),
            Some(&func("mask_email"))
        );
        assert_eq!(
            store.lookup_composite("public.users.email"),
            Some(&func("mask_email"))
        );
    }

    #[test]
    fn test_store_lookup_is_exact() {
        let mut store = RuleStore::new();
        store.insert(key("default.default.email"), func("mask_email"));

        assert_eq!(store.lookup(&key("public.users.email")), None);
        assert!(store.contains(&key("default.default.email")));
    }

    #[test]
    fn test_store_overwrite_keeps_position() {
        let mut store = RuleStore::new();
        store.insert(key("public.users.email"), func("first"));
        store.insert(key("public.users.phone"), func("phone"));

        let previous = store.insert(key("Public.Users.Email"), func("second"));
        assert_eq!(previous, Some(func("first")));
        assert_eq!(store.len(), 2);

        let functions: Vec<&str> = store.iter().map(|e| e.function.as_str()).collect();
        assert_eq!(functions, vec!["second", "phone"]);
    }

    #[test]
    fn test_store_function_files_deduplicated() {
        let mut store = RuleStore::new();
        store.record_function_file(Path::new("funcs/ssn.sql"));
        store.record_function_file(Path::new("funcs/email.sql"));
        store.record_function_file(Path::new("funcs/ssn.sql"));

        assert_eq!(
            store.function_files(),
            &[PathBuf::from("funcs/ssn.sql"), PathBuf::from("funcs/email.sql")]
        );
    }

    #[test]
    fn test_store_display() {
        let mut store = RuleStore::new();
        store.insert(key("public.users.email"), func("mask_email"));
        store.insert(key("default.default.phone"), func("default"));

        assert_eq!(
            store.to_string(),
            "public.users.email -> mask_email\ndefault.default.phone -> default\n"
        );
    }

    #[test]
    fn test_store_serde() {
        let mut store = RuleStore::new();
        store.insert(key("public.users.email"), func("mask_email"));
        store.record_function_file(Path::new("funcs/email.sql"));

        let json = serde_json::to_string(&store).unwrap();
        let back: RuleStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn test_store_deserialize_rebuilds_keys() {
        let json = r#"{
            "rules": [
                {"key": {"schema": "Public", "table": "users", "field": "email"}, "function": "first"},
                {"key": {"schema": "public", "table": "users", "field": "email"}, "function": "second"}
            ]
        }"#;
        let store: RuleStore = serde_json::from_str(json).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.lookup_composite("public.users.email"),
            Some(&func("second"))
        );
        assert!(store.function_files().is_empty());
    }

    #[test]
    fn test_store_deserialize_rejects_keyed_map() {
        let json = r#"{
            "rules": {
                "public.users.email": {
                    "key": {"schema": "other", "table": "t", "field": "f"},
                    "function": "mask_email"
                }
            },
            "function_files": []
        }"#;
        assert!(serde_json::from_str::<RuleStore>(json).is_err());
    }

    #[test]
    fn test_store_shared_across_threads() {
        let mut store = RuleStore::new();
        store.insert(key("public.users.email"), func("mask_email"));
        let store = std::sync::Arc::new(store);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = std::sync::Arc::clone(&store);
                scope.spawn(move || {
                    assert_eq!(
                        store.lookup_composite("public.users.email"),
                        Some(&func("mask_email"))
                    );
                });
            }
        });
    }
}
