//! Placeholder substitution for chained requests.
//!
//! A chain link may reference data returned by an earlier link with
//! `%{reference.path.to.value}` (or the older `${...}` form). Paths are dot
//! separated; object keys and array indexes are both plain segments, so
//! `%{search.data.0.id}` reads `data[0].id` of the `search` response.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$%]\{([^}]+)\}").expect("placeholder pattern is valid"));

/// What to do with a placeholder whose path does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// Fail the substitution.
    #[default]
    Strict,
    /// Substitute a configured default.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("no value at '{path}'")]
    Unresolved { path: String },
}

/// Decoded response bodies of a chain, keyed by reference id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    entries: Map<String, Value>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference_id: impl Into<String>, data: Value) {
        self.entries.insert(reference_id.into(), data);
    }

    pub fn get(&self, reference_id: &str) -> Option<&Value> {
        self.entries.get(reference_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a dotted path whose first segment is a reference id.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.entries.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }
}

/// Replaces placeholders in URIs and bodies with reference data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSubstituter {
    policy: TokenPolicy,
    missing_value: String,
}

impl TokenSubstituter {
    pub fn new(policy: TokenPolicy, missing_value: impl Into<String>) -> Self {
        Self {
            policy,
            missing_value: missing_value.into(),
        }
    }

    pub fn strict() -> Self {
        Self::new(TokenPolicy::Strict, "")
    }

    pub fn lenient(missing_value: impl Into<String>) -> Self {
        Self::new(TokenPolicy::Lenient, missing_value)
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Substitute every placeholder in `subject`.
    ///
    /// Each distinct path is looked up once, so repeated occurrences always
    /// receive the same value. Under the strict policy nothing is replaced
    /// unless every path resolves.
    pub fn substitute(&self, subject: &str, data: &ReferenceData) -> Result<String, TokenError> {
        let paths = placeholders(subject);
        if paths.is_empty() {
            return Ok(subject.to_string());
        }

        let mut resolved: HashMap<&str, String> = HashMap::with_capacity(paths.len());
        for path in paths {
            let value = match data.lookup(path) {
                Some(value) => render(value),
                None => match self.policy {
                    TokenPolicy::Strict => {
                        return Err(TokenError::Unresolved {
                            path: path.to_string(),
                        })
                    }
                    TokenPolicy::Lenient => {
                        tracing::debug!(path, "Substituting default for unresolved token");
                        self.missing_value.clone()
                    }
                },
            };
            resolved.insert(path, value);
        }

        let substituted = PLACEHOLDER.replace_all(subject, |caps: &Captures| {
            resolved
                .get(&caps[1])
                .cloned()
                .unwrap_or_default()
        });

        Ok(substituted.into_owned())
    }
}

/// Distinct placeholder paths in `subject`, in order of first appearance.
pub fn placeholders(subject: &str) -> Vec<&str> {
    let mut paths: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(subject) {
        if let Some(path) = caps.get(1).map(|m| m.as_str()) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> ReferenceData {
        let mut data = ReferenceData::new();
        data.insert(
            "post",
            json!({
                "id": 1,
                "request": "one",
                "author": {"id": 90},
                "related_posts": [{"id": 56}, {"id": 99}],
                "draft": false,
            }),
        );
        data
    }

    #[test]
    fn test_substitutes_both_dialects() {
        let substituter = TokenSubstituter::strict();
        let data = data();

        assert_eq!(
            substituter.substitute("/users/%{post.author.id}", &data).unwrap(),
            "/users/90"
        );
        assert_eq!(
            substituter.substitute("/users/${post.author.id}", &data).unwrap(),
            "/users/90"
        );
        assert_eq!(
            substituter
                .substitute(r#"{"foo": "bar", "baz": "%{post.request}"}"#, &data)
                .unwrap(),
            r#"{"foo": "bar", "baz": "one"}"#
        );
    }

    #[test]
    fn test_array_indexes_and_scalars() {
        let substituter = TokenSubstituter::strict();
        let data = data();

        assert_eq!(
            substituter
                .substitute("/posts/%{post.related_posts.1.id}?draft=%{post.draft}", &data)
                .unwrap(),
            "/posts/99?draft=false"
        );
    }

    #[test]
    fn test_repeated_paths_get_one_value() {
        let substituter = TokenSubstituter::strict();
        let out = substituter
            .substitute("/a/%{post.id}/b/${post.id}/c/%{post.id}", &data())
            .unwrap();
        assert_eq!(out, "/a/1/b/1/c/1");
        assert_eq!(placeholders("/a/%{post.id}/b/${post.id}"), vec!["post.id"]);
    }

    #[test]
    fn test_strict_fails_on_missing_path() {
        let substituter = TokenSubstituter::strict();
        let err = substituter
            .substitute("/users/%{post.author.id}/%{post.editor.id}", &data())
            .unwrap_err();
        assert_eq!(
            err,
            TokenError::Unresolved {
                path: "post.editor.id".into()
            }
        );

        // Unknown reference ids and out-of-range indexes are also missing.
        assert!(substituter.substitute("%{user.id}", &data()).is_err());
        assert!(substituter.substitute("%{post.related_posts.5.id}", &data()).is_err());
    }

    #[test]
    fn test_lenient_substitutes_default() {
        let substituter = TokenSubstituter::lenient("missing");
        let out = substituter
            .substitute("/users/%{post.editor.id}/%{post.id}", &data())
            .unwrap();
        assert_eq!(out, "/users/missing/1");
    }

    #[test]
    fn test_subject_without_placeholders_is_untouched() {
        let substituter = TokenSubstituter::strict();
        assert_eq!(
            substituter.substitute("/plain/path?q={x}", &ReferenceData::new()).unwrap(),
            "/plain/path?q={x}"
        );
    }
}
