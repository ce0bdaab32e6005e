//! Canonicalizes wire header names into the exact casing
//! [`cognition_policy::header_name_for_key`] expects (§4.3).

use std::collections::HashMap;

use axum::http::HeaderMap;

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// axum lower-cases header names internally; scope extraction needs the
/// `X-Cognition-Scope-<Key>` casing the policy layer produces.
pub fn canonicalize(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((title_case(name.as_str()), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn lowercase_wire_header_becomes_title_case() {
        let mut headers = HeaderMap::new();
        headers.insert("x-cognition-scope-user", HeaderValue::from_static("alice"));
        let map = canonicalize(&headers);
        assert_eq!(map.get("X-Cognition-Scope-User").map(String::as_str), Some("alice"));
    }
}
