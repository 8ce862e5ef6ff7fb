//! Persistence manager
//!
//! Insert, replace and remove for records, built on the validation and
//! resolution engines. Store-level uniqueness violations are translated
//! into `DuplicateDocument`, locked-field drift at replace time into
//! `ConstraintViolated`, and the optimistic-concurrency check rides on
//! the store's revision tokens. The namespace-tag side effect of
//! identifier inserts is reported in the outcome instead of being
//! hidden inside the call.

use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::entity::Specialization;
use crate::error::{DictError, DictResult};
use crate::paths::{self, PathDiff};
use crate::record::Record;
use crate::store::{
    Attributes, DocumentMeta, DocumentRef, DocumentStore, StoreError, ID_FIELD, KEY_FIELD,
    REV_FIELD,
};

/// Cross-record side effect of an insert
///
/// The kernel performs no retry and no compensation: when the atomic
/// namespace-tag append is rejected after a successful primary insert,
/// the primary record stays persisted and the caller sees `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// The entity type has no side effect, or no namespace is set
    NotNeeded,
    /// The namespace record now carries the usage tag
    Applied,
    /// The append was rejected; caller may retry or reconcile
    Failed(StoreError),
}

/// Result of a successful insert
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub meta: DocumentMeta,
    pub side_effect: SideEffect,
}

/// Result of a successful replace
#[derive(Debug, Clone)]
pub struct ReplaceOutcome {
    pub revised: bool,
    pub rev: String,
    /// Descriptor-path delta, present for annex records
    pub path_diff: Option<PathDiff>,
}

impl Record {
    /// Insert the record into its collection
    ///
    /// Fails with `AlreadyPersistent` before touching the store when
    /// the record was already inserted or resolved. On success the
    /// generated identity triple is copied back and the record becomes
    /// persistent.
    pub fn insert(&mut self, store: &dyn DocumentStore) -> DictResult<InsertOutcome> {
        if self.is_persistent() {
            return Err(DictError::AlreadyPersistent);
        }
        self.validate()?;

        let collection = self.collection().to_string();
        if !store.collection_exists(&collection) {
            return Err(DictError::BadCollection { collection });
        }
        match store.collection_kind(&collection) {
            Some(kind) if kind == self.entity().kind => {}
            _ => return Err(DictError::BadCollection { collection }),
        }

        self.prepare_for_write()?;

        let meta = match store.insert(&collection, self.attributes()) {
            Ok(meta) => meta,
            Err(StoreError::UniqueViolation { .. }) => {
                return Err(DictError::DuplicateDocument {
                    fields: self.unique_field_values(),
                });
            }
            Err(other) => return Err(DictError::Store(other)),
        };

        let attrs = self.attributes_mut();
        attrs.insert(ID_FIELD.to_string(), JsonValue::String(meta.id.clone()));
        attrs.insert(KEY_FIELD.to_string(), JsonValue::String(meta.key.clone()));
        attrs.insert(REV_FIELD.to_string(), JsonValue::String(meta.rev.clone()));
        self.set_persistent(true);

        info!(
            entity = self.entity().name,
            collection = %collection,
            key = %meta.key,
            "document inserted"
        );

        let side_effect = if self.entity().specialization == Specialization::Identifier {
            self.apply_namespace_tag(store)?
        } else {
            SideEffect::NotNeeded
        };

        Ok(InsertOutcome { meta, side_effect })
    }

    /// Replace the stored copy with the in-memory record
    ///
    /// Returns `None` without touching the store when the record is not
    /// persistent. The stored copy is re-read first: its absence is a
    /// hard failure (external deletion), and any locked field differing
    /// between the stored copy and memory aborts the write. With
    /// `check_revision` set the store rejects the write on a stale
    /// revision token.
    pub fn replace(
        &mut self,
        store: &dyn DocumentStore,
        check_revision: bool,
    ) -> DictResult<Option<ReplaceOutcome>> {
        if !self.is_persistent() {
            return Ok(None);
        }
        self.validate()?;

        let collection = self.collection().to_string();
        let key = self
            .key()
            .ok_or_else(|| DictError::BadDocumentReference {
                reference: collection.clone(),
            })?
            .to_string();

        let existing = store.fetch(&collection, &key).map_err(|e| match e {
            StoreError::NotFound => DictError::DocumentNotFound {
                reference: format!("{}/{}", collection, key),
            },
            other => DictError::Store(other),
        })?;

        let drifted: Vec<String> = self
            .entity()
            .policy
            .locked
            .iter()
            .filter(|field| field.as_str() != KEY_FIELD)
            .filter(|field| existing.get(field.as_str()) != self.value_of(field))
            .cloned()
            .collect();
        if !drifted.is_empty() {
            return Err(DictError::ConstraintViolated { fields: drifted });
        }

        let path_diff = if self.entity().specialization == Specialization::Annex {
            Some(self.refresh_descriptor_paths(Some(&existing))?)
        } else {
            None
        };

        let expected_rev = if check_revision {
            self.revision().map(|r| r.to_string())
        } else {
            None
        };
        let update = store.replace(
            &collection,
            &key,
            self.attributes(),
            expected_rev.as_deref(),
        )?;

        let revised = update.rev != update.old_rev;
        self.set_was_revised(revised);
        self.attributes_mut()
            .insert(REV_FIELD.to_string(), JsonValue::String(update.rev.clone()));

        info!(
            entity = self.entity().name,
            collection = %collection,
            key = %key,
            revised,
            "document replaced"
        );

        Ok(Some(ReplaceOutcome {
            revised,
            rev: update.rev,
            path_diff,
        }))
    }

    /// Remove the stored copy
    ///
    /// Returns `None` when the record is not persistent, `Some(false)`
    /// when the store no longer holds the document (tolerated, the
    /// record still becomes non-persistent) and `Some(true)` on a real
    /// delete. Referential constraints are checked first.
    pub fn remove(&mut self, store: &dyn DocumentStore) -> DictResult<Option<bool>> {
        if !self.is_persistent() {
            return Ok(None);
        }
        self.check_removal_constraints()?;

        let collection = self.collection().to_string();
        let key = self
            .key()
            .ok_or_else(|| DictError::BadDocumentReference {
                reference: collection.clone(),
            })?
            .to_string();

        match store.remove(&collection, &key) {
            Ok(()) => {
                self.set_persistent(false);
                info!(collection = %collection, key = %key, "document removed");
                Ok(Some(true))
            }
            Err(StoreError::NotFound) => {
                // externally deleted; logically gone either way
                self.set_persistent(false);
                warn!(collection = %collection, key = %key, "document was already gone");
                Ok(Some(false))
            }
            Err(other) => Err(DictError::Store(other)),
        }
    }

    /// Re-issue the namespace-tag append for an insert whose side
    /// effect failed
    pub fn apply_namespace_tag(&self, store: &dyn DocumentStore) -> DictResult<SideEffect> {
        let keys = self.context().keys();
        let nid_key = keys.resolve("nid")?.to_string();
        let instances_key = keys.resolve("instances")?.to_string();

        let Some(nid) = self.value_of(&nid_key).and_then(|v| v.as_str()) else {
            return Ok(SideEffect::NotNeeded);
        };
        // an unparsable namespace reference is a side-effect failure,
        // never an error after the primary record is already persisted
        let parsed = match DocumentRef::parse(nid) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(namespace = %nid, error = %e, "malformed namespace reference");
                return Ok(SideEffect::Failed(e));
            }
        };
        let ns_collection = parsed
            .collection
            .unwrap_or_else(|| self.collection().to_string());

        let tag = json!(self.collection());
        match store.append_to_set(&ns_collection, &parsed.key, &instances_key, &tag) {
            Ok(()) => Ok(SideEffect::Applied),
            Err(e) => {
                warn!(
                    namespace = %format!("{}/{}", ns_collection, parsed.key),
                    error = %e,
                    "namespace tag append failed after insert"
                );
                Ok(SideEffect::Failed(e))
            }
        }
    }

    /// Specialization work that must land in the attribute map before
    /// the store write
    fn prepare_for_write(&mut self) -> DictResult<()> {
        match self.entity().specialization {
            Specialization::Identifier => {
                // the primary key of an identifier is its global id
                let gid_key = self.context().keys().resolve("gid")?.to_string();
                let gid = self
                    .value_of(&gid_key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| DictError::IncompleteObject {
                        missing: vec![gid_key],
                    })?;
                self.set_property(KEY_FIELD, JsonValue::String(gid), true, false)
            }
            Specialization::Annex => {
                self.refresh_descriptor_paths(None)?;
                Ok(())
            }
            Specialization::Plain => Ok(()),
        }
    }

    /// Recompute the descriptor-path list from the structured content
    ///
    /// With a previous stored copy given, the returned diff carries the
    /// additions/removals against its path list.
    fn refresh_descriptor_paths(&mut self, previous: Option<&Attributes>) -> DictResult<PathDiff> {
        let keys = self.context().keys();
        let content_key = keys.resolve("content")?.to_string();
        let paths_key = keys.resolve("paths")?.to_string();

        let content = self
            .value_of(&content_key)
            .cloned()
            .unwrap_or(JsonValue::Null);
        let current = paths::collect_paths(&content);
        let stored = paths::paths_from_value(previous.and_then(|p| p.get(&paths_key)));
        let diff = paths::diff_paths(&stored, &current);

        let list: Vec<JsonValue> = current
            .iter()
            .map(|p| JsonValue::String(p.clone()))
            .collect();
        self.attributes_mut()
            .insert(paths_key, JsonValue::Array(list));
        Ok(diff)
    }

    /// Removal constraints of the specialization
    fn check_removal_constraints(&self) -> DictResult<()> {
        if self.entity().specialization == Specialization::Identifier {
            let instances_key = self.context().keys().resolve("instances")?.to_string();
            let in_use = self
                .value_of(&instances_key)
                .and_then(|v| v.as_array())
                .map(|list| !list.is_empty())
                .unwrap_or(false);
            if in_use {
                // still referenced as a namespace by other records
                return Err(DictError::ConstraintViolated {
                    fields: vec![instances_key],
                });
            }
        }
        Ok(())
    }

    /// Configured unique fields with their attempted values, for the
    /// duplicate-document report
    fn unique_field_values(&self) -> Vec<(String, JsonValue)> {
        self.entity()
            .policy
            .unique
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    self.value_of(field).cloned().unwrap_or(JsonValue::Null),
                )
            })
            .collect()
    }
}
