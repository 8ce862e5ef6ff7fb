//! Error handling for the persistence kernel
//!
//! This module provides idiomatic Rust error types using thiserror. The
//! taxonomy mirrors the failure modes of the document kernel: bad
//! collections, incomplete objects, unresolved or ambiguous references,
//! locked-property violations, constraint drift and duplicate documents.
//! Backing-store failures the kernel does not recognize are carried
//! through unchanged in the `Store` variant.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::context::Context;
use crate::store::StoreError;

/// Main error type for the persistence kernel
#[derive(Error, Debug)]
pub enum DictError {
    #[error("collection '{collection}' is missing or has the wrong kind")]
    BadCollection { collection: String },

    #[error("missing required fields: {}", missing.join(", "))]
    IncompleteObject { missing: Vec<String> },

    #[error("invalid document reference '{reference}'")]
    BadDocumentReference { reference: String },

    #[error("document not found: {reference}")]
    DocumentNotFound { reference: String },

    #[error("ambiguous document reference on {selector}")]
    AmbiguousDocumentReference { selector: String },

    #[error("property '{field}' is locked and cannot be changed")]
    LockedProperty { field: String },

    #[error("constraint violated on fields: {}", fields.join(", "))]
    ConstraintViolated { fields: Vec<String> },

    #[error("duplicate document, unique fields: {}", format_field_values(fields))]
    DuplicateDocument { fields: Vec<(String, JsonValue)> },

    #[error("record is already persistent")]
    AlreadyPersistent,

    #[error("content validation failed: {}", violations.join("; "))]
    Schema { violations: Vec<String> },

    #[error("unknown symbolic field name '{name}'")]
    UnknownFieldName { name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for kernel operations
pub type DictResult<T> = Result<T, DictError>;

fn format_field_values(fields: &[(String, JsonValue)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

impl DictError {
    /// Stable kind tag for the boundary error shape
    pub fn kind(&self) -> &'static str {
        match self {
            DictError::BadCollection { .. } => "BadCollection",
            DictError::IncompleteObject { .. } => "IncompleteObject",
            DictError::BadDocumentReference { .. } => "BadDocumentReference",
            DictError::DocumentNotFound { .. } => "DocumentNotFound",
            DictError::AmbiguousDocumentReference { .. } => "AmbiguousDocumentReference",
            DictError::LockedProperty { .. } => "LockedProperty",
            DictError::ConstraintViolated { .. } => "ConstraintViolated",
            DictError::DuplicateDocument { .. } => "DuplicateDocument",
            DictError::AlreadyPersistent => "AlreadyPersistent",
            DictError::Schema { .. } => "Schema",
            DictError::UnknownFieldName { .. } => "UnknownFieldName",
            DictError::Store(_) => "Store",
        }
    }

    /// Message code used to select the translated message template
    pub fn message_code(&self) -> &'static str {
        match self {
            DictError::BadCollection { .. } => "bad-collection",
            DictError::IncompleteObject { .. } => "incomplete-object",
            DictError::BadDocumentReference { .. } => "bad-document-reference",
            DictError::DocumentNotFound { .. } => "document-not-found",
            DictError::AmbiguousDocumentReference { .. } => "ambiguous-document-reference",
            DictError::LockedProperty { .. } => "locked-property",
            DictError::ConstraintViolated { .. } => "constraint-violated",
            DictError::DuplicateDocument { .. } => "duplicate-document",
            DictError::AlreadyPersistent => "already-persistent",
            DictError::Schema { .. } => "schema-invalid",
            DictError::UnknownFieldName { .. } => "unknown-field-name",
            DictError::Store(e) => match e {
                StoreError::NotFound => "document-not-found",
                StoreError::UniqueViolation { .. } => "duplicate-document",
                StoreError::RevisionMismatch { .. } => "revision-mismatch",
                StoreError::NoCollection { .. } => "bad-collection",
                StoreError::Backend(_) => "store-backend",
            },
        }
    }

    /// Advisory HTTP status for an HTTP-facing caller
    pub fn http_status(&self) -> u16 {
        match self {
            DictError::BadCollection { .. } => 500,
            DictError::IncompleteObject { .. } => 400,
            DictError::BadDocumentReference { .. } => 400,
            DictError::DocumentNotFound { .. } => 404,
            DictError::AmbiguousDocumentReference { .. } => 409,
            DictError::LockedProperty { .. } => 400,
            DictError::ConstraintViolated { .. } => 409,
            DictError::DuplicateDocument { .. } => 409,
            DictError::AlreadyPersistent => 409,
            DictError::Schema { .. } => 400,
            DictError::UnknownFieldName { .. } => 500,
            DictError::Store(e) => match e {
                StoreError::NotFound => 404,
                StoreError::UniqueViolation { .. } => 409,
                StoreError::RevisionMismatch { .. } => 412,
                StoreError::NoCollection { .. } => 500,
                StoreError::Backend(_) => 500,
            },
        }
    }

    /// Variant payload as a JSON value, for the boundary error shape
    pub fn args(&self) -> JsonValue {
        match self {
            DictError::BadCollection { collection } => json!({ "collection": collection }),
            DictError::IncompleteObject { missing } => json!({ "missing": missing }),
            DictError::BadDocumentReference { reference } => json!({ "reference": reference }),
            DictError::DocumentNotFound { reference } => json!({ "reference": reference }),
            DictError::AmbiguousDocumentReference { selector } => json!({ "selector": selector }),
            DictError::LockedProperty { field } => json!({ "field": field }),
            DictError::ConstraintViolated { fields } => json!({ "fields": fields }),
            DictError::DuplicateDocument { fields } => {
                let entries: Vec<JsonValue> = fields
                    .iter()
                    .map(|(name, value)| json!({ "field": name, "value": value }))
                    .collect();
                json!({ "fields": entries })
            }
            DictError::AlreadyPersistent => JsonValue::Null,
            DictError::Schema { violations } => json!({ "violations": violations }),
            DictError::UnknownFieldName { name } => json!({ "name": name }),
            DictError::Store(e) => json!({ "store": e.to_string() }),
        }
    }

    /// Build the boundary error shape for the caller's locale
    pub fn report(&self, ctx: &Context) -> ErrorReport {
        ErrorReport {
            kind: self.kind().to_string(),
            message_code: self.message_code().to_string(),
            message: messages::render(self, ctx.locale()),
            locale: ctx.locale().to_string(),
            args: self.args(),
            http_status: self.http_status(),
        }
    }
}

/// Error shape surfaced to callers at the service boundary
///
/// `http_status` is advisory metadata for an HTTP-facing caller and is
/// not interpreted anywhere inside the kernel.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message_code: String,
    pub message: String,
    pub locale: String,
    pub args: JsonValue,
    pub http_status: u16,
}

/// Translated message rendering
///
/// The message table carries English and German templates; unknown
/// locales fall back to English. Only the locale tag is taken from the
/// request context, nothing else.
pub mod messages {
    use super::DictError;
    use crate::store::StoreError;

    /// Render the localized message for an error
    pub fn render(err: &DictError, locale: &str) -> String {
        match locale {
            "de" => render_de(err),
            _ => render_en(err),
        }
    }

    fn render_en(err: &DictError) -> String {
        match err {
            DictError::BadCollection { collection } => {
                format!("the collection '{}' is missing or unusable", collection)
            }
            DictError::IncompleteObject { missing } => {
                format!("required fields are missing: {}", missing.join(", "))
            }
            DictError::BadDocumentReference { reference } => {
                format!("'{}' is not a valid document reference", reference)
            }
            DictError::DocumentNotFound { reference } => {
                format!("no document found for '{}'", reference)
            }
            DictError::AmbiguousDocumentReference { selector } => {
                format!("more than one document matches {}", selector)
            }
            DictError::LockedProperty { field } => {
                format!("the property '{}' cannot be changed once stored", field)
            }
            DictError::ConstraintViolated { fields } => {
                format!("immutable fields were changed: {}", fields.join(", "))
            }
            DictError::DuplicateDocument { fields } => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                format!("a document with the same {} already exists", names.join("/"))
            }
            DictError::AlreadyPersistent => "the record has already been stored".to_string(),
            DictError::Schema { violations } => {
                format!("the content is invalid: {}", violations.join("; "))
            }
            DictError::UnknownFieldName { name } => {
                format!("'{}' is not a known field name", name)
            }
            DictError::Store(e) => render_store_en(e),
        }
    }

    fn render_store_en(err: &StoreError) -> String {
        match err {
            StoreError::NotFound => "the document does not exist".to_string(),
            StoreError::UniqueViolation { collection } => {
                format!("a unique constraint of '{}' was violated", collection)
            }
            StoreError::RevisionMismatch { .. } => {
                "the document was changed by someone else".to_string()
            }
            StoreError::NoCollection { collection } => {
                format!("the collection '{}' does not exist", collection)
            }
            StoreError::Backend(message) => message.clone(),
        }
    }

    fn render_de(err: &DictError) -> String {
        match err {
            DictError::BadCollection { collection } => {
                format!("die Kollektion '{}' fehlt oder ist unbrauchbar", collection)
            }
            DictError::IncompleteObject { missing } => {
                format!("Pflichtfelder fehlen: {}", missing.join(", "))
            }
            DictError::BadDocumentReference { reference } => {
                format!("'{}' ist keine gültige Dokumentreferenz", reference)
            }
            DictError::DocumentNotFound { reference } => {
                format!("kein Dokument zu '{}' gefunden", reference)
            }
            DictError::AmbiguousDocumentReference { selector } => {
                format!("mehr als ein Dokument passt auf {}", selector)
            }
            DictError::LockedProperty { field } => {
                format!(
                    "die Eigenschaft '{}' ist nach dem Speichern unveränderlich",
                    field
                )
            }
            DictError::ConstraintViolated { fields } => {
                format!("unveränderliche Felder wurden geändert: {}", fields.join(", "))
            }
            DictError::DuplicateDocument { fields } => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                format!("ein Dokument mit demselben {} existiert bereits", names.join("/"))
            }
            DictError::AlreadyPersistent => "der Datensatz wurde bereits gespeichert".to_string(),
            DictError::Schema { violations } => {
                format!("der Inhalt ist ungültig: {}", violations.join("; "))
            }
            DictError::UnknownFieldName { name } => {
                format!("'{}' ist kein bekannter Feldname", name)
            }
            // Backend messages are passed through untranslated.
            DictError::Store(_) => render_en(err),
        }
    }
}
