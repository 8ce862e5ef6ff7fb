//! dict-core - Document-persistence kernel
//!
//! This crate is the data-access kernel underneath the dictionary /
//! ontology management stack. It provides a record object model with
//! per-entity-type field policies (required, unique, locked,
//! significant, restricted, local), a resolution algorithm that locates
//! an existing document from partial data with ambiguity detection, and
//! CRUD operations with optimistic concurrency and typed conflict
//! translation. Concrete entities (namespaced identifiers, vocabulary
//! terms, toponyms, annex documents) are thin specializations of this
//! kernel.
//!
//! Transport, routing and session handling live outside this crate;
//! callers supply a [`context::Context`] (locale + key table) and a
//! [`store::DocumentStore`] implementation.
//!
//! ## Quick Start
//!
//! ```rust
//! use dict_core::{Context, EntityType, MemoryStore, Record};
//! use dict_core::store::CollectionKind;
//! use serde_json::json;
//!
//! let ctx = Context::new("en");
//! let store = MemoryStore::new();
//! store.create_collection("terms", CollectionKind::Document);
//!
//! let entity = EntityType::term(ctx.keys()).unwrap();
//! let attrs = json!({ "term": "lemma", "vocabulary": "core" });
//! let mut record = Record::new(&ctx, entity, attrs.as_object().unwrap().clone()).unwrap();
//! let outcome = record.insert(&store).unwrap();
//! assert!(record.is_persistent());
//! assert_eq!(outcome.meta.id, format!("terms/{}", outcome.meta.key));
//! ```

// Core error handling
pub mod error;

// Request context and the symbolic field-name table
pub mod context;

// Backing-store contract and the in-memory implementation
pub mod store;

// Field policies and the entity type catalog
pub mod entity;
pub mod policy;

// Record core and the engines built on it
pub mod record;
pub mod resolve;
pub mod validate;

// Persistence manager
pub mod persist;

// Specialization support
pub mod ident;
pub mod paths;

// Structural validation of entity content
pub mod schema;

// Public re-exports for the common call path
pub use context::{Context, KeyTable};
pub use entity::{EntityType, Specialization};
pub use error::{DictError, DictResult, ErrorReport};
pub use persist::{InsertOutcome, ReplaceOutcome, SideEffect};
pub use policy::FieldPolicy;
pub use record::Record;
pub use resolve::Resolution;
pub use store::{DocumentStore, MemoryStore};
