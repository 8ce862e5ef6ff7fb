//! Entity type catalog
//!
//! Every concrete entity of the dictionary application is a thin
//! specialization of the persistence kernel: an [`EntityType`] bundles
//! the backing collection, its kind, the composed field policy, the
//! content schema and a specialization tag. The catalog constructors
//! resolve all symbolic field names through the key table so a stale
//! table fails at startup.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::context::KeyTable;
use crate::error::DictResult;
use crate::policy::FieldPolicy;
use crate::store::CollectionKind;

/// Behavior attached to an entity type beyond the plain kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialization {
    /// Plain document semantics
    Plain,
    /// Namespaced identifier: derived GID, forced primary key,
    /// namespace-usage tag side effect
    Identifier,
    /// Annex document: derived descriptor-path statistics
    Annex,
}

/// One concrete entity type of the application
#[derive(Debug)]
pub struct EntityType {
    pub name: &'static str,
    pub collection: String,
    pub kind: CollectionKind,
    pub policy: FieldPolicy,
    pub schema: JsonValue,
    pub specialization: Specialization,
}

impl EntityType {
    /// Namespaced identifiers (GID/LID/NID)
    pub fn identifier(keys: &KeyTable) -> DictResult<Arc<Self>> {
        let gid = keys.resolve("gid")?;
        let lid = keys.resolve("lid")?;
        let nid = keys.resolve("nid")?;
        let instances = keys.resolve("instances")?;
        let description = keys.resolve("description")?;

        let policy = FieldPolicy::base()
            .with_required(&[gid, lid])
            .with_unique(&[gid])
            .with_locked(&[gid, lid, nid])
            .with_significant(&[gid])
            .with_significant(&[nid, lid]);

        let schema = json!({
            "type": "object",
            "properties": {
                gid: { "type": "string", "minLength": 1 },
                lid: { "type": "string", "minLength": 1 },
                nid: { "type": "string" },
                instances: { "type": "array", "items": { "type": "string" } },
                description: { "type": "string" }
            }
        });

        Ok(Arc::new(EntityType {
            name: "identifier",
            collection: "identifiers".to_string(),
            kind: CollectionKind::Document,
            policy,
            schema,
            specialization: Specialization::Identifier,
        }))
    }

    /// Controlled-vocabulary terms
    pub fn term(keys: &KeyTable) -> DictResult<Arc<Self>> {
        let term = keys.resolve("term")?;
        let vocabulary = keys.resolve("vocabulary")?;
        let editorial = keys.resolve("editorial")?;
        let status = keys.resolve("status")?;
        let description = keys.resolve("description")?;

        let policy = FieldPolicy::base()
            .with_required(&[term, vocabulary])
            .with_locked(&[vocabulary])
            .with_significant(&[vocabulary, term])
            .with_restricted(&[editorial]);

        let schema = json!({
            "type": "object",
            "properties": {
                term: { "type": "string", "minLength": 1 },
                vocabulary: { "type": "string", "minLength": 1 },
                status: { "type": "string", "default": "draft" },
                editorial: { "type": "string" },
                description: { "type": "string" }
            }
        });

        Ok(Arc::new(EntityType {
            name: "term",
            collection: "terms".to_string(),
            kind: CollectionKind::Document,
            policy,
            schema,
            specialization: Specialization::Plain,
        }))
    }

    /// Place names
    pub fn toponym(keys: &KeyTable) -> DictResult<Arc<Self>> {
        let name = keys.resolve("name")?;
        let region = keys.resolve("region")?;
        let description = keys.resolve("description")?;

        let policy = FieldPolicy::base()
            .with_required(&[name])
            .with_significant(&[name, region])
            .with_significant(&[name]);

        let schema = json!({
            "type": "object",
            "properties": {
                name: { "type": "string", "minLength": 1 },
                region: { "type": "string" },
                description: { "type": "string" }
            }
        });

        Ok(Arc::new(EntityType {
            name: "toponym",
            collection: "toponyms".to_string(),
            kind: CollectionKind::Document,
            policy,
            schema,
            specialization: Specialization::Plain,
        }))
    }

    /// Annex documents holding derived statistics
    pub fn annex(keys: &KeyTable) -> DictResult<Arc<Self>> {
        let subject = keys.resolve("subject")?;
        let content = keys.resolve("content")?;
        let paths = keys.resolve("paths")?;

        let policy = FieldPolicy::base()
            .with_required(&[subject, content])
            .with_locked(&[subject])
            .with_significant(&[subject])
            .with_local(&[paths]);

        let schema = json!({
            "type": "object",
            "properties": {
                subject: { "type": "string", "minLength": 1 },
                content: { "type": "object" },
                paths: { "type": "array", "items": { "type": "string" } }
            }
        });

        Ok(Arc::new(EntityType {
            name: "annex",
            collection: "annexes".to_string(),
            kind: CollectionKind::Document,
            policy,
            schema,
            specialization: Specialization::Annex,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KeyTable;
    use crate::store::KEY_FIELD;

    #[test]
    fn test_identifier_policy_shape() {
        let keys = KeyTable::standard();
        let entity = EntityType::identifier(&keys).expect("Should build");
        assert_eq!(entity.specialization, Specialization::Identifier);
        assert!(entity.policy.is_locked("gid"));
        assert!(entity.policy.is_locked(KEY_FIELD));
        assert_eq!(entity.policy.significant[0], vec!["gid"]);
    }

    #[test]
    fn test_annex_paths_field_is_local() {
        let keys = KeyTable::standard();
        let entity = EntityType::annex(&keys).expect("Should build");
        assert!(entity.policy.is_local("paths"));
        assert!(entity.policy.is_locked("subject"));
    }

    #[test]
    fn test_catalog_fails_on_incomplete_table() {
        let keys = KeyTable::from_pairs([("term", "term")]);
        let err = EntityType::term(&keys).expect_err("Should fail");
        assert_eq!(err.kind(), "UnknownFieldName");
    }
}
