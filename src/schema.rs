//! Structural validation of record content
//!
//! Entity types declare a JSON schema for their value types. Validation
//! first applies top-level property defaults, then runs the schema
//! through the jsonschema crate, collecting every violation instead of
//! stopping at the first. On success the caller adopts the normalized
//! attribute map.

use serde_json::Value as JsonValue;

use crate::error::{DictError, DictResult};
use crate::store::Attributes;

/// Attributes with top-level schema defaults applied
pub fn normalized(schema: &JsonValue, attrs: &Attributes) -> Attributes {
    let mut normalized = attrs.clone();
    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, definition) in properties {
            if normalized.contains_key(field) {
                continue;
            }
            if let Some(default) = definition.get("default") {
                normalized.insert(field.clone(), default.clone());
            }
        }
    }
    normalized
}

/// Validate a document against an entity schema
///
/// Note: jsonschema 0.29+ uses iter_errors() to collect all errors.
pub fn check(schema: &JsonValue, doc: &JsonValue) -> DictResult<()> {
    let validator = jsonschema::validator_for(schema).map_err(|e| DictError::Schema {
        violations: vec![format!("invalid schema: {}", e)],
    })?;
    let violations: Vec<String> = validator
        .iter_errors(doc)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DictError::Schema { violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: JsonValue) -> Attributes {
        value.as_object().expect("Should be an object").clone()
    }

    #[test]
    fn test_defaults_applied_for_absent_fields_only() {
        let schema = json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "default": "draft" },
                "term": { "type": "string" }
            }
        });
        let out = normalized(&schema, &attrs(json!({ "term": "lemma" })));
        assert_eq!(out.get("status"), Some(&json!("draft")));

        let out = normalized(&schema, &attrs(json!({ "status": "published" })));
        assert_eq!(out.get("status"), Some(&json!("published")));
    }

    #[test]
    fn test_check_collects_all_violations() {
        let schema = json!({
            "type": "object",
            "properties": {
                "term": { "type": "string" },
                "weight": { "type": "number" }
            }
        });
        let err = check(&schema, &json!({ "term": 1, "weight": "x" }))
            .expect_err("Should report violations");
        match err {
            DictError::Schema { violations } => assert_eq!(violations.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_accepts_valid_document() {
        let schema = json!({
            "type": "object",
            "properties": { "term": { "type": "string" } }
        });
        check(&schema, &json!({ "term": "lemma", "_key": "k" })).expect("Should validate");
    }
}
