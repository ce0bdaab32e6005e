//! Turns external identity assertions into a [`Scope`] and enforces
//! matching (C3), grounded on `server/app/scoping.py`.

use std::collections::HashMap;

use cognition_core::{CognitionError, Scope};

/// Server-wide scope configuration: the recognized keys and whether
/// missing headers are rejected (§4.3).
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub scope_keys: Vec<String>,
    pub scoping_enabled: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            scope_keys: Vec::new(),
            scoping_enabled: false,
        }
    }
}

/// `X-Cognition-Scope-<Title(key)>`, hyphens replacing underscores — the
/// exact header name a caller must send for `key`.
pub fn header_name_for_key(key: &str) -> String {
    let title: String = key
        .split(['_', '-'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-");
    format!("X-Cognition-Scope-{title}")
}

pub struct ScopeHarness {
    config: ScopeConfig,
}

impl ScopeHarness {
    pub fn new(config: ScopeConfig) -> Self {
        Self { config }
    }

    /// `headers` is a case-sensitive exact-name lookup, as produced by the
    /// caller's HTTP layer after canonicalizing header casing.
    pub fn extract(&self, headers: &HashMap<String, String>) -> Scope {
        let mut values = std::collections::BTreeMap::new();
        for key in &self.config.scope_keys {
            let header_name = header_name_for_key(key);
            if let Some(value) = headers.get(&header_name) {
                if !value.is_empty() {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        Scope::from_map(values)
    }

    /// Fails closed with [`CognitionError::Forbidden`] listing the missing
    /// expected header names when scoping is enabled and any configured
    /// key's header is absent.
    pub fn enforce(&self, extracted: &Scope) -> Result<(), CognitionError> {
        if !self.config.scoping_enabled {
            return Ok(());
        }
        let missing: Vec<String> = self
            .config
            .scope_keys
            .iter()
            .filter(|key| extracted.get(key).is_none())
            .map(|key| header_name_for_key(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CognitionError::Forbidden {
                missing_headers: missing,
            })
        }
    }

    /// Convenience combining extraction and enforcement.
    pub fn extract_and_enforce(
        &self,
        headers: &HashMap<String, String>,
    ) -> Result<Scope, CognitionError> {
        let scope = self.extract(headers);
        self.enforce(&scope)?;
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn header_name_title_cases_and_hyphenates() {
        assert_eq!(header_name_for_key("user"), "X-Cognition-Scope-User");
        assert_eq!(header_name_for_key("org_id"), "X-Cognition-Scope-Org-Id");
    }

    #[test]
    fn extraction_drops_empty_values() {
        let harness = ScopeHarness::new(ScopeConfig {
            scope_keys: vec!["user".into()],
            scoping_enabled: false,
        });
        let scope = harness.extract(&headers(&[("X-Cognition-Scope-User", "")]));
        assert!(scope.is_empty());
    }

    #[test]
    fn enforcement_disabled_never_rejects() {
        let harness = ScopeHarness::new(ScopeConfig {
            scope_keys: vec!["user".into()],
            scoping_enabled: false,
        });
        assert!(harness.extract_and_enforce(&headers(&[])).is_ok());
    }

    #[test]
    fn enforcement_enabled_rejects_missing_header_with_names() {
        let harness = ScopeHarness::new(ScopeConfig {
            scope_keys: vec!["user".into(), "project".into()],
            scoping_enabled: true,
        });
        let err = harness
            .extract_and_enforce(&headers(&[("X-Cognition-Scope-User", "alice")]))
            .unwrap_err();
        match err {
            CognitionError::Forbidden { missing_headers } => {
                assert_eq!(missing_headers, vec!["X-Cognition-Scope-Project".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn enforcement_enabled_admits_when_all_present() {
        let harness = ScopeHarness::new(ScopeConfig {
            scope_keys: vec!["user".into()],
            scoping_enabled: true,
        });
        let scope = harness
            .extract_and_enforce(&headers(&[("X-Cognition-Scope-User", "alice")]))
            .unwrap();
        assert_eq!(scope.get("user"), Some("alice"));
    }
}
