//! Backing document-store contract
//!
//! The kernel never talks to a concrete database directly; it consumes
//! the [`DocumentStore`] trait. All calls are synchronous and blocking,
//! ordering guarantees come from the store's per-document atomicity,
//! and cancellation is the store client's concern. An in-memory
//! implementation lives in [`memory`] and backs the test suite.

use std::fmt;

use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Storage key of the per-collection primary key
pub const KEY_FIELD: &str = "_key";
/// Storage key of the store-wide document id (`collection/key`)
pub const ID_FIELD: &str = "_id";
/// Storage key of the opaque revision token
pub const REV_FIELD: &str = "_rev";

/// Attribute map of a single document
pub type Attributes = serde_json::Map<String, JsonValue>;

/// Kind of a backing collection
///
/// Checked by one generic validator at insert time; entity types
/// declare the kind they expect instead of overriding hook methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Document => write!(f, "document"),
            CollectionKind::Edge => write!(f, "edge"),
        }
    }
}

/// Parsed document reference
///
/// Either a compound id `collection/key` or a bare key whose collection
/// must come from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub collection: Option<String>,
    pub key: String,
}

impl DocumentRef {
    /// Parse a reference string; empty segments are invalid
    pub fn parse(reference: &str) -> Result<Self, StoreError> {
        if reference.is_empty() {
            return Err(StoreError::Backend("empty document reference".to_string()));
        }
        match reference.split_once('/') {
            Some((collection, key)) => {
                if collection.is_empty() || key.is_empty() || key.contains('/') {
                    Err(StoreError::Backend(format!(
                        "malformed document reference '{}'",
                        reference
                    )))
                } else {
                    Ok(DocumentRef {
                        collection: Some(collection.to_string()),
                        key: key.to_string(),
                    })
                }
            }
            None => Ok(DocumentRef {
                collection: None,
                key: reference.to_string(),
            }),
        }
    }

    /// Fully-qualified id, falling back to the given collection
    pub fn qualified(&self, default_collection: &str) -> String {
        match &self.collection {
            Some(collection) => format!("{}/{}", collection, self.key),
            None => format!("{}/{}", default_collection, self.key),
        }
    }
}

/// Identity triple returned by a successful insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub id: String,
    pub key: String,
    pub rev: String,
}

/// Revision pair returned by a successful replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionUpdate {
    pub rev: String,
    pub old_rev: String,
}

/// Errors reported by a backing store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,

    #[error("unique constraint violated in collection '{collection}'")]
    UniqueViolation { collection: String },

    #[error("revision mismatch: expected '{expected}', found '{found}'")]
    RevisionMismatch { expected: String, found: String },

    #[error("collection '{collection}' does not exist")]
    NoCollection { collection: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Synchronous document-store contract consumed by the kernel
pub trait DocumentStore {
    /// Whether a collection of any kind exists under this name
    fn collection_exists(&self, name: &str) -> bool;

    /// Kind of the named collection, if it exists
    fn collection_kind(&self, name: &str) -> Option<CollectionKind>;

    /// Fetch one document by collection and key
    fn fetch(&self, collection: &str, key: &str) -> Result<Attributes, StoreError>;

    /// All documents of a collection matching the example by equality
    fn find_by_example(
        &self,
        collection: &str,
        example: &Attributes,
    ) -> Result<Vec<Attributes>, StoreError>;

    /// Insert a document, generating the key when `_key` is absent
    fn insert(&self, collection: &str, attrs: &Attributes) -> Result<DocumentMeta, StoreError>;

    /// Replace a document; with `expected_rev` set the store must
    /// reject the write when the current revision differs
    fn replace(
        &self,
        collection: &str,
        key: &str,
        attrs: &Attributes,
        expected_rev: Option<&str>,
    ) -> Result<RevisionUpdate, StoreError>;

    /// Delete a document
    fn remove(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// Atomically append a value to an array field unless it is already
    /// present. One read-modify-write against the target document; used
    /// for the namespace-usage tag.
    fn append_to_set(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: &JsonValue,
    ) -> Result<(), StoreError>;
}
