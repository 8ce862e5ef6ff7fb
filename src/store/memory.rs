//! In-memory document store
//!
//! A `RwLock`-guarded map of collections, each with its documents and
//! unique indexes. Keys and revision tokens are generated uuids;
//! compound ids follow the `collection/key` convention. The write lock
//! makes `append_to_set` the single atomic read-modify-write the
//! kernel's namespace-tag side effect requires.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{
    Attributes, CollectionKind, DocumentMeta, DocumentStore, RevisionUpdate, StoreError, ID_FIELD,
    KEY_FIELD, REV_FIELD,
};

#[derive(Debug)]
struct Collection {
    kind: CollectionKind,
    docs: HashMap<String, Attributes>,
    // each entry is one unique index over the listed storage keys
    unique_indexes: Vec<Vec<String>>,
}

impl Collection {
    fn new(kind: CollectionKind) -> Self {
        Collection {
            kind,
            docs: HashMap::new(),
            unique_indexes: vec![vec![KEY_FIELD.to_string()]],
        }
    }

    /// Whether any stored document (other than `skip_key`) carries the
    /// same values as `attrs` on every field of some unique index.
    fn violates_unique(&self, attrs: &Attributes, skip_key: Option<&str>) -> bool {
        for index in &self.unique_indexes {
            let candidate: Vec<(&String, &JsonValue)> = index
                .iter()
                .filter_map(|field| attrs.get(field).map(|value| (field, value)))
                .collect();
            if candidate.len() != index.len() {
                // index fields not fully present, nothing to enforce
                continue;
            }
            let collides = self.docs.iter().any(|(key, doc)| {
                if skip_key == Some(key.as_str()) {
                    return false;
                }
                candidate
                    .iter()
                    .all(|(field, value)| doc.get(*field) == Some(*value))
            });
            if collides {
                return true;
            }
        }
        false
    }
}

/// In-memory `DocumentStore` implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection; replaces any existing one of the same name
    pub fn create_collection(&self, name: &str, kind: CollectionKind) {
        let mut collections = self.collections.write().expect("store lock poisoned");
        collections.insert(name.to_string(), Collection::new(kind));
    }

    /// Declare a unique index over the given storage keys
    pub fn ensure_unique_index(&self, name: &str, fields: &[&str]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let collection = collections.get_mut(name).ok_or(StoreError::NoCollection {
            collection: name.to_string(),
        })?;
        let index: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        if !collection.unique_indexes.contains(&index) {
            collection.unique_indexes.push(index);
        }
        Ok(())
    }

    /// Number of documents in a collection (test helper)
    pub fn count(&self, name: &str) -> usize {
        let collections = self.collections.read().expect("store lock poisoned");
        collections.get(name).map(|c| c.docs.len()).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn collection_exists(&self, name: &str) -> bool {
        let collections = self.collections.read().expect("store lock poisoned");
        collections.contains_key(name)
    }

    fn collection_kind(&self, name: &str) -> Option<CollectionKind> {
        let collections = self.collections.read().expect("store lock poisoned");
        collections.get(name).map(|c| c.kind)
    }

    fn fetch(&self, collection: &str, key: &str) -> Result<Attributes, StoreError> {
        let collections = self.collections.read().expect("store lock poisoned");
        let col = collections
            .get(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;
        col.docs.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn find_by_example(
        &self,
        collection: &str,
        example: &Attributes,
    ) -> Result<Vec<Attributes>, StoreError> {
        let collections = self.collections.read().expect("store lock poisoned");
        let col = collections
            .get(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;
        let mut matches: Vec<Attributes> = col
            .docs
            .values()
            .filter(|doc| {
                example
                    .iter()
                    .all(|(field, value)| doc.get(field) == Some(value))
            })
            .cloned()
            .collect();
        // deterministic order for callers and tests
        matches.sort_by(|a, b| {
            let ka = a.get(KEY_FIELD).and_then(|v| v.as_str()).unwrap_or("");
            let kb = b.get(KEY_FIELD).and_then(|v| v.as_str()).unwrap_or("");
            ka.cmp(kb)
        });
        Ok(matches)
    }

    fn insert(&self, collection: &str, attrs: &Attributes) -> Result<DocumentMeta, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let col = collections
            .get_mut(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;

        let key = match attrs.get(KEY_FIELD).and_then(|v| v.as_str()) {
            Some(key) => key.to_string(),
            None => new_token(),
        };

        let mut doc = attrs.clone();
        doc.insert(KEY_FIELD.to_string(), JsonValue::String(key.clone()));
        if col.docs.contains_key(&key) || col.violates_unique(&doc, None) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
            });
        }

        let id = format!("{}/{}", collection, key);
        let rev = new_token();
        doc.insert(ID_FIELD.to_string(), JsonValue::String(id.clone()));
        doc.insert(REV_FIELD.to_string(), JsonValue::String(rev.clone()));
        col.docs.insert(key.clone(), doc);

        Ok(DocumentMeta { id, key, rev })
    }

    fn replace(
        &self,
        collection: &str,
        key: &str,
        attrs: &Attributes,
        expected_rev: Option<&str>,
    ) -> Result<RevisionUpdate, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let col = collections
            .get_mut(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;

        let current_rev = {
            let existing = col.docs.get(key).ok_or(StoreError::NotFound)?;
            existing
                .get(REV_FIELD)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        if let Some(expected) = expected_rev {
            if expected != current_rev {
                return Err(StoreError::RevisionMismatch {
                    expected: expected.to_string(),
                    found: current_rev,
                });
            }
        }

        let mut doc = attrs.clone();
        doc.insert(KEY_FIELD.to_string(), JsonValue::String(key.to_string()));
        if col.violates_unique(&doc, Some(key)) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
            });
        }

        let rev = new_token();
        doc.insert(
            ID_FIELD.to_string(),
            JsonValue::String(format!("{}/{}", collection, key)),
        );
        doc.insert(REV_FIELD.to_string(), JsonValue::String(rev.clone()));
        col.docs.insert(key.to_string(), doc);

        Ok(RevisionUpdate {
            rev,
            old_rev: current_rev,
        })
    }

    fn remove(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let col = collections
            .get_mut(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;
        col.docs.remove(key).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn append_to_set(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: &JsonValue,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let col = collections
            .get_mut(collection)
            .ok_or(StoreError::NoCollection {
                collection: collection.to_string(),
            })?;
        let doc = col.docs.get_mut(key).ok_or(StoreError::NotFound)?;

        let entry = doc
            .entry(field.to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        let list = entry
            .as_array_mut()
            .ok_or_else(|| StoreError::Backend(format!("field '{}' is not an array", field)))?;
        if !list.iter().any(|existing| existing == value) {
            list.push(value.clone());
            doc.insert(REV_FIELD.to_string(), JsonValue::String(new_token()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(collection: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection(collection, CollectionKind::Document);
        store
    }

    fn attrs(value: JsonValue) -> Attributes {
        value.as_object().expect("Should be an object").clone()
    }

    #[test]
    fn test_insert_generates_identity_triple() {
        let store = store_with("terms");
        let meta = store
            .insert("terms", &attrs(json!({ "term": "lemma" })))
            .expect("Should insert");
        assert_eq!(meta.id, format!("terms/{}", meta.key));

        let doc = store.fetch("terms", &meta.key).expect("Should fetch");
        assert_eq!(doc.get("_rev"), Some(&json!(meta.rev)));
        assert_eq!(doc.get("term"), Some(&json!("lemma")));
    }

    #[test]
    fn test_unique_index_enforced() {
        let store = store_with("terms");
        store
            .ensure_unique_index("terms", &["vocabulary", "term"])
            .expect("Should index");
        store
            .insert("terms", &attrs(json!({ "vocabulary": "v1", "term": "a" })))
            .expect("Should insert");
        let err = store
            .insert("terms", &attrs(json!({ "vocabulary": "v1", "term": "a" })))
            .expect_err("Should collide");
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        // differing on one index field is fine
        store
            .insert("terms", &attrs(json!({ "vocabulary": "v2", "term": "a" })))
            .expect("Should insert");
    }

    #[test]
    fn test_replace_checks_revision() {
        let store = store_with("terms");
        let meta = store
            .insert("terms", &attrs(json!({ "term": "a" })))
            .expect("Should insert");

        let err = store
            .replace("terms", &meta.key, &attrs(json!({ "term": "b" })), Some("stale"))
            .expect_err("Should reject stale revision");
        assert!(matches!(err, StoreError::RevisionMismatch { .. }));

        let upd = store
            .replace(
                "terms",
                &meta.key,
                &attrs(json!({ "term": "b" })),
                Some(&meta.rev),
            )
            .expect("Should replace");
        assert_eq!(upd.old_rev, meta.rev);
        assert_ne!(upd.rev, upd.old_rev);
    }

    #[test]
    fn test_append_to_set_is_idempotent() {
        let store = store_with("ns");
        let meta = store
            .insert("ns", &attrs(json!({ "lid": "NS" })))
            .expect("Should insert");

        store
            .append_to_set("ns", &meta.key, "instances", &json!("identifiers"))
            .expect("Should append");
        store
            .append_to_set("ns", &meta.key, "instances", &json!("identifiers"))
            .expect("Should tolerate re-append");

        let doc = store.fetch("ns", &meta.key).expect("Should fetch");
        assert_eq!(doc.get("instances"), Some(&json!(["identifiers"])));
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let store = store_with("terms");
        let err = store.remove("terms", "nope").expect_err("Should fail");
        assert_eq!(err, StoreError::NotFound);
    }
}
