//! Descriptor-path derivation for annex documents
//!
//! An annex document carries a structured content tree; the set of
//! distinct dotted key paths referenced transitively by that tree is
//! stored alongside the document and maintained across replaces.
//! Arrays descend without contributing a path segment.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

/// Counts of path additions and removals between two stored versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathDiff {
    pub added: usize,
    pub removed: usize,
}

/// Distinct dotted key paths referenced transitively by `content`
pub fn collect_paths(content: &JsonValue) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    walk(content, &mut Vec::new(), &mut paths);
    paths
}

fn walk(value: &JsonValue, prefix: &mut Vec<String>, paths: &mut BTreeSet<String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                paths.insert(prefix.join("."));
                walk(child, prefix, paths);
                prefix.pop();
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                walk(item, prefix, paths);
            }
        }
        _ => {}
    }
}

/// Diff two path sets, counting additions and removals
pub fn diff_paths(old: &BTreeSet<String>, new: &BTreeSet<String>) -> PathDiff {
    PathDiff {
        added: new.difference(old).count(),
        removed: old.difference(new).count(),
    }
}

/// Read a stored path list (an array of strings) back into a set
pub fn paths_from_value(value: Option<&JsonValue>) -> BTreeSet<String> {
    match value.and_then(|v| v.as_array()) {
        Some(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
        None => BTreeSet::new(),
    }
}
