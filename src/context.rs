//! Request context and the symbolic field-name table
//!
//! The application keeps a frozen table mapping symbolic field names
//! ("key", "gid", "instances", ...) to the storage keys actually used in
//! documents ("_key", "gid", ...). The table is built once at process
//! start and shared read-only; entity catalogs resolve their field
//! policies against it at construction time so a misspelled symbolic
//! name fails early, not on a request path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DictError, DictResult};

/// Immutable symbolic-name to storage-key table
#[derive(Debug)]
pub struct KeyTable {
    entries: HashMap<String, String>,
}

impl KeyTable {
    /// Build the standard table used by the dictionary application
    pub fn standard() -> Self {
        let pairs: &[(&str, &str)] = &[
            // store identity triple
            ("key", "_key"),
            ("id", "_id"),
            ("rev", "_rev"),
            // identifier fields
            ("gid", "gid"),
            ("lid", "lid"),
            ("nid", "nid"),
            ("instances", "instances"),
            // vocabulary terms
            ("term", "term"),
            ("vocabulary", "vocabulary"),
            ("editorial", "editorial"),
            ("status", "status"),
            // toponyms
            ("name", "name"),
            ("region", "region"),
            // annex documents
            ("subject", "subject"),
            ("content", "content"),
            ("paths", "paths"),
            ("description", "description"),
        ];
        let entries = pairs
            .iter()
            .map(|(sym, key)| (sym.to_string(), key.to_string()))
            .collect();
        KeyTable { entries }
    }

    /// Build a table from explicit pairs (tests, alternate deployments)
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(sym, key)| (sym.into(), key.into()))
            .collect();
        KeyTable { entries }
    }

    /// Look up the storage key for a symbolic name
    pub fn storage_key(&self, symbolic: &str) -> Option<&str> {
        self.entries.get(symbolic).map(|s| s.as_str())
    }

    /// Look up a storage key, failing on unknown symbolic names
    pub fn resolve(&self, symbolic: &str) -> DictResult<&str> {
        self.storage_key(symbolic)
            .ok_or_else(|| DictError::UnknownFieldName {
                name: symbolic.to_string(),
            })
    }
}

/// Per-request context handed to the kernel by the caller
///
/// Carries the locale used to render error messages and a shared
/// reference to the key table. Nothing else is required from the
/// routing/session layer.
#[derive(Debug, Clone)]
pub struct Context {
    locale: String,
    keys: Arc<KeyTable>,
}

impl Context {
    /// Context with the standard key table
    pub fn new(locale: impl Into<String>) -> Self {
        Context {
            locale: locale.into(),
            keys: Arc::new(KeyTable::standard()),
        }
    }

    /// Context with a caller-supplied key table
    pub fn with_table(locale: impl Into<String>, keys: Arc<KeyTable>) -> Self {
        Context {
            locale: locale.into(),
            keys,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    /// Shared handle to the key table
    pub fn keys_handle(&self) -> Arc<KeyTable> {
        Arc::clone(&self.keys)
    }
}
