use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Immutable identity tuple attached to a session at creation (§3, §4.3).
///
/// Matching is subset-based: a filter `Scope` matches a session's `Scope`
/// iff every `(k, v)` pair in the filter is also present in the session's
/// scope with the same value. An empty scope is unscoped and matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope(BTreeMap<String, String>);

impl Scope {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// `self` is the filter; returns true iff every key/value in `self` is
    /// present with the same value in `other` (§3, §4.3, invariant 4 in §8).
    pub fn subset_matches(&self, other: &Scope) -> bool {
        self.0
            .iter()
            .all(|(k, v)| other.0.get(k).map(|ov| ov == v).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, &str)]) -> Scope {
        Scope::from_map(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn empty_filter_matches_anything() {
        assert!(Scope::empty().subset_matches(&scope(&[("user", "alice")])));
    }

    #[test]
    fn exact_match() {
        let s = scope(&[("user", "alice")]);
        assert!(s.subset_matches(&s.clone()));
    }

    #[test]
    fn filter_subset_of_session_scope_matches() {
        let filter = scope(&[("user", "alice")]);
        let session = scope(&[("user", "alice"), ("project", "acme")]);
        assert!(filter.subset_matches(&session));
    }

    #[test]
    fn mismatched_value_does_not_match() {
        let filter = scope(&[("user", "alice")]);
        let session = scope(&[("user", "bob")]);
        assert!(!filter.subset_matches(&session));
    }

    #[test]
    fn missing_key_does_not_match() {
        let filter = scope(&[("project", "acme")]);
        let session = scope(&[("user", "alice")]);
        assert!(!filter.subset_matches(&session));
    }
}
