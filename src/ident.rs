//! Global-identifier composition
//!
//! A namespaced identifier derives its global id (GID) from the key of
//! the namespace record it references (NID) and its own local id (LID):
//! `NS:LID`, or just `LID` when it lives outside any namespace.

/// Separator between namespace key and local id in a composed GID
pub const GID_SEPARATOR: char = ':';

/// Key portion of a namespace reference (`ns/NS` -> `NS`)
pub fn namespace_key(nid: &str) -> &str {
    match nid.rsplit_once('/') {
        Some((_, key)) => key,
        None => nid,
    }
}

/// Compose a global id from an optional namespace reference and a local id
pub fn compose(nid: Option<&str>, lid: &str) -> String {
    match nid {
        Some(nid) if !nid.is_empty() => {
            format!("{}{}{}", namespace_key(nid), GID_SEPARATOR, lid)
        }
        _ => lid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_without_namespace() {
        assert_eq!(compose(None, "LID"), "LID");
        assert_eq!(compose(Some(""), "LID"), "LID");
    }

    #[test]
    fn test_compose_with_namespace_reference() {
        assert_eq!(compose(Some("ns/NS"), "LID"), "NS:LID");
        // a bare key is accepted as namespace reference too
        assert_eq!(compose(Some("NS"), "LID"), "NS:LID");
    }
}
