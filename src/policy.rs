//! Field-policy descriptors
//!
//! Each entity type declares which of its fields are required, unique,
//! locked (immutable once persisted), significant (ordered combinations
//! used to locate an existing document), restricted (stripped from the
//! external view) and local (store-computed, excluded from content
//! comparisons). Policies are plain data composed from a base policy
//! plus per-type extensions; each extension concatenates onto what it
//! inherits, so no runtime dispatch is involved.

use crate::store::KEY_FIELD;

/// Declarative per-entity-type field policy
///
/// All field names are storage keys, already resolved through the
/// key table by the entity catalog.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicy {
    pub required: Vec<String>,
    pub unique: Vec<String>,
    pub locked: Vec<String>,
    pub significant: Vec<Vec<String>>,
    pub restricted: Vec<String>,
    pub local: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, fields: &[&str]) {
    for field in fields {
        if !list.iter().any(|f| f == field) {
            list.push(field.to_string());
        }
    }
}

impl FieldPolicy {
    /// Base policy every document type inherits: the primary key is
    /// unique and implicitly locked.
    pub fn base() -> Self {
        FieldPolicy {
            unique: vec![KEY_FIELD.to_string()],
            locked: vec![KEY_FIELD.to_string()],
            ..FieldPolicy::default()
        }
    }

    pub fn with_required(mut self, fields: &[&str]) -> Self {
        push_unique(&mut self.required, fields);
        self
    }

    pub fn with_unique(mut self, fields: &[&str]) -> Self {
        push_unique(&mut self.unique, fields);
        self
    }

    pub fn with_locked(mut self, fields: &[&str]) -> Self {
        push_unique(&mut self.locked, fields);
        self
    }

    /// Append one significant-field combination; declaration order is
    /// resolution order.
    pub fn with_significant(mut self, combination: &[&str]) -> Self {
        let combination: Vec<String> = combination.iter().map(|f| f.to_string()).collect();
        if !self.significant.contains(&combination) {
            self.significant.push(combination);
        }
        self
    }

    pub fn with_restricted(mut self, fields: &[&str]) -> Self {
        push_unique(&mut self.restricted, fields);
        self
    }

    pub fn with_local(mut self, fields: &[&str]) -> Self {
        push_unique(&mut self.local, fields);
        self
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field)
    }

    pub fn is_locked(&self, field: &str) -> bool {
        self.locked.iter().any(|f| f == field)
    }

    pub fn is_restricted(&self, field: &str) -> bool {
        self.restricted.iter().any(|f| f == field)
    }

    pub fn is_local(&self, field: &str) -> bool {
        self.local.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_policy_invariants() {
        let policy = FieldPolicy::base();
        assert!(policy.unique.iter().any(|f| f == KEY_FIELD));
        assert!(policy.is_locked(KEY_FIELD));
    }

    #[test]
    fn test_composition_concatenates() {
        let policy = FieldPolicy::base()
            .with_required(&["gid", "lid"])
            .with_unique(&["gid"])
            .with_locked(&["gid", "lid", "nid"])
            .with_significant(&["gid"])
            .with_significant(&["nid", "lid"]);

        assert_eq!(policy.required, vec!["gid", "lid"]);
        // base primary key stays first
        assert_eq!(policy.unique, vec![KEY_FIELD, "gid"]);
        assert!(policy.is_locked("nid"));
        assert_eq!(
            policy.significant,
            vec![vec!["gid".to_string()], vec!["nid".to_string(), "lid".to_string()]]
        );
    }

    #[test]
    fn test_duplicate_fields_collapse() {
        let policy = FieldPolicy::base()
            .with_locked(&["gid"])
            .with_locked(&["gid"]);
        assert_eq!(policy.locked, vec![KEY_FIELD, "gid"]);
    }
}
