//! Endpoint attributes.
//!
//! Attributes are JSON-like trees. Static attributes come from the manifest,
//! dynamic attributes are supplied at connection time and shadow static ones
//! with the same top-level key.

use std::collections::BTreeMap;

use serde_json::Value;

/// An ordered attribute map.
pub type Attrs = BTreeMap<String, Value>;

/// A validated dotted path into an attribute tree (e.g. `content.read`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    /// Parse a dotted path.
    ///
    /// Each segment must be non-empty and made of ASCII letters, digits,
    /// `-` or `_`. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }

        let mut segments = Vec::new();
        for segment in s.split('.') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return None;
            }
            segments.push(segment.to_string());
        }

        Some(AttrPath { segments })
    }

    /// Build a single-segment path from an attribute key.
    pub fn key(key: impl Into<String>) -> Self {
        AttrPath {
            segments: vec![key.into()],
        }
    }

    /// Path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for AttrPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Look up a path in an attribute map.
pub fn lookup<'a>(attrs: &'a Attrs, path: &AttrPath) -> Option<&'a Value> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = attrs.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Look up a path, preferring dynamic attributes over static ones.
pub fn lookup_merged<'a>(
    static_attrs: &'a Attrs,
    dynamic_attrs: &'a Attrs,
    path: &AttrPath,
) -> Option<&'a Value> {
    let top = path.segments.first()?;
    if dynamic_attrs.contains_key(top) {
        lookup(dynamic_attrs, path)
    } else {
        lookup(static_attrs, path)
    }
}

/// String form of a scalar attribute, used for pattern matching.
///
/// Returns `None` for lists, maps and null.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
