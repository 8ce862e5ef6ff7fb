//! Resolution engine
//!
//! Locates the persisted document matching a partially-populated record
//! using the entity's significant-field combinations: the first
//! combination whose fields are all present becomes the equality
//! selector. Zero matches is a soft miss, one match loads the record,
//! more than one is a data-integrity failure regardless of how strict
//! the caller is.

use tracing::debug;

use crate::entity::Specialization;
use crate::error::{DictError, DictResult};
use crate::record::Record;
use crate::store::{Attributes, DocumentStore};

/// Outcome of a non-strict resolution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one persisted document matched and was loaded
    Resolved,
    /// The selector matched nothing; the record stays non-persistent
    NotFound,
    /// No significant-field combination was fully present
    NoSelector,
}

impl Record {
    /// Resolve the record from the store
    ///
    /// With `replace_existing` set, freshly-resolved store values
    /// overwrite in-memory edits (re-sync after a store read); without
    /// it, in-memory edits are preserved except for locked fields,
    /// which always reconcile from the store and surface
    /// `AmbiguousDocumentReference` when they genuinely disagree.
    pub fn resolve(
        &mut self,
        store: &dyn DocumentStore,
        replace_existing: bool,
    ) -> DictResult<Resolution> {
        // identifier pre-check: a non-persistent record may still be
        // missing its derived GID
        if self.entity().specialization == Specialization::Identifier && !self.is_persistent() {
            let gid_key = self.context().keys().resolve("gid")?.to_string();
            if self.value_of(&gid_key).is_none() {
                self.derive_global_id(false)?;
            }
        }

        let Some(selector_fields) = self.active_selector() else {
            return Ok(Resolution::NoSelector);
        };
        let mut example = Attributes::new();
        for field in &selector_fields {
            if let Some(value) = self.value_of(field) {
                example.insert(field.clone(), value.clone());
            }
        }

        let matches = store.find_by_example(self.collection(), &example)?;
        debug!(
            collection = self.collection(),
            selector = ?selector_fields,
            matches = matches.len(),
            "resolution query"
        );

        match matches.len() {
            0 => {
                self.set_persistent(false);
                Ok(Resolution::NotFound)
            }
            1 => {
                self.modify(&matches[0], replace_existing, true)?;
                self.set_persistent(true);
                Ok(Resolution::Resolved)
            }
            _ => Err(DictError::AmbiguousDocumentReference {
                selector: format!("{}[{}]", self.collection(), selector_fields.join(", ")),
            }),
        }
    }

    /// Strict resolution: soft misses become typed errors
    pub fn resolve_strict(
        &mut self,
        store: &dyn DocumentStore,
        replace_existing: bool,
    ) -> DictResult<()> {
        match self.resolve(store, replace_existing)? {
            Resolution::Resolved => Ok(()),
            Resolution::NotFound => Err(DictError::DocumentNotFound {
                reference: self.describe_selector(),
            }),
            Resolution::NoSelector => Err(DictError::IncompleteObject {
                missing: self.missing_selector_fields(),
            }),
        }
    }

    /// First significant combination whose fields are all present
    fn active_selector(&self) -> Option<Vec<String>> {
        self.entity()
            .policy
            .significant
            .iter()
            .find(|combination| {
                combination
                    .iter()
                    .all(|field| self.value_of(field).is_some())
            })
            .cloned()
    }

    fn describe_selector(&self) -> String {
        match self.active_selector() {
            Some(fields) => format!("{}[{}]", self.collection(), fields.join(", ")),
            None => self.collection().to_string(),
        }
    }

    /// Absent fields of the first declared combination, for the
    /// missing-to-resolve report
    fn missing_selector_fields(&self) -> Vec<String> {
        self.entity()
            .policy
            .significant
            .first()
            .map(|combination| {
                combination
                    .iter()
                    .filter(|field| self.value_of(field).is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::entity::EntityType;
    use crate::store::{CollectionKind, MemoryStore};
    use serde_json::{json, Value as JsonValue};

    fn attrs(value: JsonValue) -> Attributes {
        value.as_object().expect("Should be an object").clone()
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection("toponyms", CollectionKind::Document);
        store
            .insert(
                "toponyms",
                &attrs(json!({ "name": "Springfield", "region": "Illinois" })),
            )
            .expect("Should insert");
        store
            .insert(
                "toponyms",
                &attrs(json!({ "name": "Springfield", "region": "Missouri" })),
            )
            .expect("Should insert");
        store
    }

    #[test]
    fn test_first_full_combination_wins() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(
            &ctx,
            entity,
            attrs(json!({ "name": "Springfield", "region": "Illinois" })),
        )
        .expect("Should build record");

        // [name, region] is declared before [name] and is fully
        // present, so the narrower selector is used
        let outcome = record.resolve(&store, true).expect("Should resolve");
        assert_eq!(outcome, Resolution::Resolved);
        assert!(record.is_persistent());
        assert_eq!(record.value_of("region"), Some(&json!("Illinois")));
    }

    #[test]
    fn test_ambiguity_is_always_an_error() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(&ctx, entity, attrs(json!({ "name": "Springfield" })))
            .expect("Should build record");

        // the non-strict path reports ambiguity just as hard
        let err = record.resolve(&store, true).expect_err("Should be ambiguous");
        assert_eq!(err.kind(), "AmbiguousDocumentReference");
    }

    #[test]
    fn test_soft_miss_and_strict_upgrade() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(&ctx, entity, attrs(json!({ "name": "Nowhere" })))
            .expect("Should build record");

        assert_eq!(
            record.resolve(&store, true).expect("Should miss softly"),
            Resolution::NotFound
        );
        assert!(!record.is_persistent());

        let err = record
            .resolve_strict(&store, true)
            .expect_err("Should be not found");
        assert_eq!(err.kind(), "DocumentNotFound");
    }

    #[test]
    fn test_no_selector_reports_missing_fields() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(&ctx, entity, attrs(json!({ "description": "x" })))
            .expect("Should build record");

        assert_eq!(
            record.resolve(&store, true).expect("Should have no selector"),
            Resolution::NoSelector
        );
        let err = record
            .resolve_strict(&store, true)
            .expect_err("Should be incomplete");
        match err {
            DictError::IncompleteObject { missing } => {
                assert_eq!(missing, vec!["name", "region"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_preserves_edits_unless_replacing() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(
            &ctx,
            entity,
            attrs(json!({
                "name": "Springfield",
                "region": "Illinois",
                "description": "my note"
            })),
        )
        .expect("Should build record");

        record.resolve(&store, false).expect("Should resolve");
        // in-memory edit preserved, identity triple adopted
        assert_eq!(record.value_of("description"), Some(&json!("my note")));
        assert!(record.key().is_some());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let ctx = Context::new("en");
        let store = seeded_store();
        let entity = EntityType::toponym(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(
            &ctx,
            entity.clone(),
            attrs(json!({ "name": "Springfield", "region": "Illinois" })),
        )
        .expect("Should build record");
        record.resolve(&store, true).expect("Should resolve");
        let first = record.attributes().clone();

        record.resolve(&store, true).expect("Should resolve again");
        assert_eq!(record.attributes(), &first);
    }
}
