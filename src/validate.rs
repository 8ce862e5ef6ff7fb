//! Validation engine
//!
//! Runs before every write, in three short-circuiting stages: derived
//! fields of the specialization, the aggregated required-field check,
//! and structural validation of the content schema. On success the
//! record adopts the normalized (defaults-applied) attribute map.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::entity::Specialization;
use crate::error::{DictError, DictResult};
use crate::record::Record;
use crate::schema;

impl Record {
    /// Validate the record for writing
    ///
    /// Stage order matters: a derived field conflicting with a locked
    /// persisted value fails before the required-field check, and all
    /// missing required fields are reported in one error rather than
    /// one at a time.
    pub fn validate(&mut self) -> DictResult<()> {
        // (a) specialization-derived fields
        if self.entity().specialization == Specialization::Identifier {
            self.derive_global_id(true)?;
        }

        // (b) required fields, aggregated
        let missing: Vec<String> = self
            .entity()
            .policy
            .required
            .iter()
            .filter(|field| {
                matches!(self.value_of(field), None | Some(JsonValue::Null))
            })
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DictError::IncompleteObject { missing });
        }

        // (c) structural validation; adopt the normalized output
        let normalized = schema::normalized(&self.entity().schema, self.attributes());
        schema::check(
            &self.entity().schema,
            &JsonValue::Object(normalized.clone()),
        )?;
        self.set_attributes(normalized);

        debug!(
            entity = self.entity().name,
            collection = self.collection(),
            "record validated"
        );
        Ok(())
    }

    /// Non-strict companion of [`Record::validate`]
    pub fn is_valid(&mut self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::entity::EntityType;
    use crate::error::DictError;
    use crate::record::Record;
    use crate::store::Attributes;
    use serde_json::{json, Value as JsonValue};

    fn attrs(value: JsonValue) -> Attributes {
        value.as_object().expect("Should be an object").clone()
    }

    #[test]
    fn test_missing_required_fields_aggregated() {
        let ctx = Context::new("en");
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let mut record =
            Record::new(&ctx, entity, attrs(json!({ "description": "only extras" })))
                .expect("Should build record");

        let err = record.validate().expect_err("Should be incomplete");
        match err {
            DictError::IncompleteObject { missing } => {
                assert_eq!(missing, vec!["term", "vocabulary"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!record.is_valid());
    }

    #[test]
    fn test_defaults_adopted_on_success() {
        let ctx = Context::new("en");
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(
            &ctx,
            entity,
            attrs(json!({ "term": "lemma", "vocabulary": "v1" })),
        )
        .expect("Should build record");

        record.validate().expect("Should validate");
        assert_eq!(record.value_of("status"), Some(&json!("draft")));
    }

    #[test]
    fn test_type_violations_reported() {
        let ctx = Context::new("en");
        let entity = EntityType::term(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(
            &ctx,
            entity,
            attrs(json!({ "term": 7, "vocabulary": "v1" })),
        )
        .expect("Should build record");

        let err = record.validate().expect_err("Should be invalid");
        assert_eq!(err.kind(), "Schema");
    }

    #[test]
    fn test_identifier_derivation_failure_uses_missing_code() {
        let ctx = Context::new("en");
        let entity = EntityType::identifier(ctx.keys()).expect("Should build entity");
        let mut record = Record::new(&ctx, entity, attrs(json!({ "nid": "ns/NS" })))
            .expect("Should build record");

        let err = record.validate().expect_err("Should be incomplete");
        match err {
            DictError::IncompleteObject { missing } => assert_eq!(missing, vec!["lid"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
