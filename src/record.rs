//! Record core
//!
//! A [`Record`] wraps one document of an entity type: its attribute
//! map, the owning collection and three lifecycle flags. All mutation
//! funnels through [`Record::modify`] and [`Record::set_property`],
//! which honor the entity's field policy. A record is owned exclusively
//! by the caller that constructed it; the backing store owns the
//! durable copy.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::context::Context;
use crate::entity::{EntityType, Specialization};
use crate::error::{DictError, DictResult};
use crate::ident;
use crate::store::{Attributes, DocumentRef, DocumentStore, ID_FIELD, KEY_FIELD, REV_FIELD};

/// One in-memory document of an entity type
#[derive(Debug, Clone)]
pub struct Record {
    ctx: Context,
    entity: Arc<EntityType>,
    attrs: Attributes,
    persistent: bool,
    was_revised: bool,
    immutable_view: bool,
}

impl Record {
    /// Build a record from supplied attributes
    ///
    /// The record stays non-persistent until it is inserted or
    /// resolved. Attributes are loaded through `modify` with full
    /// replacement, then the specialization's normalization runs.
    pub fn new(ctx: &Context, entity: Arc<EntityType>, attrs: Attributes) -> DictResult<Self> {
        let mut record = Record {
            ctx: ctx.clone(),
            entity,
            attrs: Attributes::new(),
            persistent: false,
            was_revised: false,
            immutable_view: false,
        };
        record.modify(&attrs, true, false)?;
        record.normalize()?;
        Ok(record)
    }

    /// Load a record from a reference string
    ///
    /// The reference is either a compound id (`collection/key`) or a
    /// bare key. A compound id naming a different collection than the
    /// entity's fails with `DocumentNotFound`; so does absence in the
    /// store. The loaded record is persistent. With `immutable` set the
    /// record rejects caller-side edits.
    pub fn from_reference(
        ctx: &Context,
        entity: Arc<EntityType>,
        store: &dyn DocumentStore,
        reference: &str,
        immutable: bool,
    ) -> DictResult<Self> {
        let parsed = DocumentRef::parse(reference).map_err(|_| DictError::BadDocumentReference {
            reference: reference.to_string(),
        })?;
        if let Some(collection) = &parsed.collection {
            if collection != &entity.collection {
                return Err(DictError::DocumentNotFound {
                    reference: reference.to_string(),
                });
            }
        }

        let attrs = store
            .fetch(&entity.collection, &parsed.key)
            .map_err(|e| match e {
                crate::store::StoreError::NotFound => DictError::DocumentNotFound {
                    reference: reference.to_string(),
                },
                other => DictError::Store(other),
            })?;

        let mut record = Record {
            ctx: ctx.clone(),
            entity,
            attrs: Attributes::new(),
            persistent: false,
            was_revised: false,
            immutable_view: false,
        };
        record.modify(&attrs, true, false)?;
        record.persistent = true;
        record.immutable_view = immutable;
        record.normalize()?;
        Ok(record)
    }

    /// Turn the record into an immutable view; later caller edits fail
    /// with `LockedProperty`
    pub fn freeze(&mut self) {
        self.immutable_view = true;
    }

    /// Specialization hook run after construction
    ///
    /// Identifiers derive their GID right away when the record is not
    /// yet persistent and the inputs are present; nothing fails here.
    fn normalize(&mut self) -> DictResult<()> {
        if self.entity.specialization == Specialization::Identifier && !self.persistent {
            self.derive_global_id(false)?;
        }
        Ok(())
    }

    /// Apply a batch of field values
    ///
    /// A field is applied iff `replace` is set, or the field is locked
    /// (locked fields always reconcile toward the supplied data; a
    /// genuine disagreement surfaces in `set_property`), or the record
    /// does not currently hold the field.
    pub fn modify(&mut self, data: &Attributes, replace: bool, resolving: bool) -> DictResult<()> {
        for (field, value) in data {
            let is_locked = self.entity.policy.is_locked(field);
            if replace || is_locked || !self.attrs.contains_key(field) {
                self.set_property(field, value.clone(), is_locked, resolving)?;
            }
        }
        Ok(())
    }

    /// Set, overwrite or delete a single attribute
    ///
    /// Equal values are a no-op. Changing a locked field of a
    /// persistent record fails with `LockedProperty` for caller edits,
    /// or `AmbiguousDocumentReference` while resolving (a store-loaded
    /// document disagreeing with an in-memory locked field signals a
    /// stale or duplicate reference, not a user edit). A null value
    /// deletes the attribute.
    pub fn set_property(
        &mut self,
        field: &str,
        value: JsonValue,
        is_locked: bool,
        resolving: bool,
    ) -> DictResult<()> {
        let current = self.attrs.get(field);
        if current == Some(&value) || (current.is_none() && value.is_null()) {
            return Ok(());
        }

        if is_locked && self.persistent {
            return if resolving {
                Err(DictError::AmbiguousDocumentReference {
                    selector: format!("{}.{}", self.entity.collection, field),
                })
            } else {
                Err(DictError::LockedProperty {
                    field: field.to_string(),
                })
            };
        }
        if self.immutable_view && !resolving {
            return Err(DictError::LockedProperty {
                field: field.to_string(),
            });
        }

        if value.is_null() {
            self.attrs.remove(field);
            debug!(field, "attribute deleted");
        } else {
            self.attrs.insert(field.to_string(), value);
        }
        Ok(())
    }

    /// Derive the composed global id for identifier records
    ///
    /// With `strict` set, a missing local id fails with the
    /// missing-required-fields code; otherwise derivation is skipped
    /// silently. A derived value conflicting with a locked persisted
    /// GID fails in `set_property`.
    pub(crate) fn derive_global_id(&mut self, strict: bool) -> DictResult<()> {
        let keys = self.ctx.keys();
        let gid_key = keys.resolve("gid")?.to_string();
        let lid_key = keys.resolve("lid")?.to_string();
        let nid_key = keys.resolve("nid")?.to_string();

        let lid = match self.attrs.get(&lid_key).and_then(|v| v.as_str()) {
            Some(lid) if !lid.is_empty() => lid.to_string(),
            _ => {
                return if strict {
                    Err(DictError::IncompleteObject {
                        missing: vec![lid_key],
                    })
                } else {
                    Ok(())
                };
            }
        };
        let nid = self
            .attrs
            .get(&nid_key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let gid = ident::compose(nid.as_deref(), &lid);
        let is_locked = self.entity.policy.is_locked(&gid_key);
        self.set_property(&gid_key, JsonValue::String(gid), is_locked, false)
    }

    // -- accessors ---------------------------------------------------

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn entity_handle(&self) -> Arc<EntityType> {
        Arc::clone(&self.entity)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn collection(&self) -> &str {
        &self.entity.collection
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn set_attributes(&mut self, attrs: Attributes) {
        self.attrs = attrs;
    }

    pub(crate) fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub(crate) fn set_was_revised(&mut self, was_revised: bool) {
        self.was_revised = was_revised;
    }

    pub fn value_of(&self, field: &str) -> Option<&JsonValue> {
        self.attrs.get(field)
    }

    pub fn key(&self) -> Option<&str> {
        self.attrs.get(KEY_FIELD).and_then(|v| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attrs.get(ID_FIELD).and_then(|v| v.as_str())
    }

    pub fn revision(&self) -> Option<&str> {
        self.attrs.get(REV_FIELD).and_then(|v| v.as_str())
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn was_revised(&self) -> bool {
        self.was_revised
    }

    pub fn is_immutable_view(&self) -> bool {
        self.immutable_view
    }

    /// Attributes as exposed to external clients, with restricted
    /// fields stripped
    pub fn external_view(&self) -> Attributes {
        self.attrs
            .iter()
            .filter(|(field, _)| !self.entity.policy.is_restricted(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Content equality against other attributes, ignoring local
    /// (store-computed) fields and the identity triple
    pub fn content_equals(&self, other: &Attributes) -> bool {
        let relevant = |field: &str| {
            field != KEY_FIELD
                && field != ID_FIELD
                && field != REV_FIELD
                && !self.entity.policy.is_local(field)
        };
        let mine = self.attrs.iter().filter(|(f, _)| relevant(f));
        let mut count = 0usize;
        for (field, value) in mine {
            count += 1;
            if other.get(field) != Some(value) {
                return false;
            }
        }
        let theirs = other.iter().filter(|(f, _)| relevant(f)).count();
        count == theirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::store::{CollectionKind, MemoryStore};
    use serde_json::json;

    fn attrs(value: JsonValue) -> Attributes {
        value.as_object().expect("Should be an object").clone()
    }

    fn term_record(ctx: &Context, value: JsonValue) -> Record {
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        Record::new(ctx, entity, attrs(value)).expect("Should build record")
    }

    #[test]
    fn test_new_record_is_not_persistent() {
        let ctx = Context::new("en");
        let record = term_record(&ctx, json!({ "term": "lemma", "vocabulary": "v1" }));
        assert!(!record.is_persistent());
        assert_eq!(record.value_of("term"), Some(&json!("lemma")));
    }

    #[test]
    fn test_modify_keeps_existing_unless_replacing() {
        let ctx = Context::new("en");
        let mut record = term_record(&ctx, json!({ "term": "lemma", "vocabulary": "v1" }));

        record
            .modify(&attrs(json!({ "term": "other", "status": "published" })), false, false)
            .expect("Should modify");
        // existing field kept, absent field added
        assert_eq!(record.value_of("term"), Some(&json!("lemma")));
        assert_eq!(record.value_of("status"), Some(&json!("published")));

        record
            .modify(&attrs(json!({ "term": "other" })), true, false)
            .expect("Should replace");
        assert_eq!(record.value_of("term"), Some(&json!("other")));
    }

    #[test]
    fn test_null_deletes_attribute() {
        let ctx = Context::new("en");
        let mut record = term_record(
            &ctx,
            json!({ "term": "lemma", "vocabulary": "v1", "status": "draft" }),
        );
        record
            .set_property("status", JsonValue::Null, false, false)
            .expect("Should delete");
        assert_eq!(record.value_of("status"), None);
    }

    #[test]
    fn test_locked_field_mutable_until_persistent() {
        let ctx = Context::new("en");
        let mut record = term_record(&ctx, json!({ "term": "lemma", "vocabulary": "v1" }));

        // not persistent yet: locked field may still change
        record
            .set_property("vocabulary", json!("v2"), true, false)
            .expect("Should change");

        record.set_persistent(true);
        let err = record
            .set_property("vocabulary", json!("v3"), true, false)
            .expect_err("Should be locked");
        assert_eq!(err.kind(), "LockedProperty");

        // while resolving, the same disagreement means a stale reference
        let err = record
            .set_property("vocabulary", json!("v3"), true, true)
            .expect_err("Should be ambiguous");
        assert_eq!(err.kind(), "AmbiguousDocumentReference");

        // equal value is a no-op either way
        record
            .set_property("vocabulary", json!("v2"), true, false)
            .expect("Should be a no-op");
    }

    #[test]
    fn test_identifier_gid_derived_on_construction() {
        let ctx = Context::new("en");
        let entity = EntityType::identifier(ctx.keys()).expect("Should build entity");
        let record = Record::new(&ctx, entity, attrs(json!({ "lid": "LID" })))
            .expect("Should build record");
        assert_eq!(record.value_of("gid"), Some(&json!("LID")));

        let entity = EntityType::identifier(ctx.keys()).expect("Should build entity");
        let record = Record::new(&ctx, entity, attrs(json!({ "lid": "LID", "nid": "ns/NS" })))
            .expect("Should build record");
        assert_eq!(record.value_of("gid"), Some(&json!("NS:LID")));
    }

    #[test]
    fn test_from_reference_checks_collection() {
        let ctx = Context::new("en");
        let store = MemoryStore::new();
        store.create_collection("terms", CollectionKind::Document);
        let meta = store
            .insert("terms", &attrs(json!({ "term": "lemma", "vocabulary": "v1" })))
            .expect("Should insert");

        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let record = Record::from_reference(&ctx, entity, &store, &meta.id, false)
            .expect("Should load");
        assert!(record.is_persistent());
        assert_eq!(record.key(), Some(meta.key.as_str()));

        // compound id naming a foreign collection does not resolve
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let err = Record::from_reference(&ctx, entity, &store, "toponyms/xyz", false)
            .expect_err("Should fail");
        assert_eq!(err.kind(), "DocumentNotFound");
    }

    #[test]
    fn test_immutable_view_rejects_edits() {
        let ctx = Context::new("en");
        let store = MemoryStore::new();
        store.create_collection("terms", CollectionKind::Document);
        let meta = store
            .insert("terms", &attrs(json!({ "term": "lemma", "vocabulary": "v1" })))
            .expect("Should insert");

        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let mut record = Record::from_reference(&ctx, entity, &store, &meta.id, true)
            .expect("Should load");
        let err = record
            .set_property("status", json!("published"), false, false)
            .expect_err("Should reject");
        assert_eq!(err.kind(), "LockedProperty");
    }

    #[test]
    fn test_external_view_strips_restricted() {
        let ctx = Context::new("en");
        let record = term_record(
            &ctx,
            json!({ "term": "lemma", "vocabulary": "v1", "editorial": "internal note" }),
        );
        let view = record.external_view();
        assert!(view.contains_key("term"));
        assert!(!view.contains_key("editorial"));
    }

    #[test]
    fn test_content_equality_ignores_local_and_revision() {
        let ctx = Context::new("en");
        let entity = EntityType::annex(ctx.keys()).expect("Should build entity");
        let record = Record::new(
            &ctx,
            entity,
            attrs(json!({ "subject": "s", "content": { "a": 1 } })),
        )
        .expect("Should build record");

        let mut other = record.attributes().clone();
        other.insert("paths".to_string(), json!(["a"]));
        other.insert("_rev".to_string(), json!("r2"));
        assert!(record.content_equals(&other));

        other.insert("subject".to_string(), json!("t"));
        assert!(!record.content_equals(&other));
    }

    #[test]
    fn test_content_equality_ignores_identity_triple() {
        let ctx = Context::new("en");
        let store = MemoryStore::new();
        store.create_collection("terms", CollectionKind::Document);

        let client = attrs(json!({ "term": "lemma", "vocabulary": "v1", "status": "draft" }));
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(&ctx, entity, client.clone()).expect("Should build record");
        record.insert(&store).expect("Should insert");

        // the store-generated _key/_id/_rev are not content
        assert!(record.key().is_some());
        assert!(record.content_equals(&client));
        assert!(!record.content_equals(&attrs(json!({ "term": "lemma" }))));
    }
}
