//! Safe nested lookup over untyped payload trees.
//!
//! Every extractor recognizes and decodes its payload through the helpers in
//! this module instead of chaining `get` calls by hand. A lookup walks an
//! ordered sequence of [`PathSegment`]s and yields `None` (or a caller
//! supplied default) as soon as a segment is missing, of the wrong kind or out
//! of range. Only a malformed path itself is an error.
//!
//! # Absent versus falsy
//!
//! JSON `null` counts as absent. Every other value, including `false`, `0`,
//! `""`, `[]` and `{}`, is a present value and is returned as is. Extractors
//! that want the looser "present and non-empty" check use [`nested_truthy`]
//! or [`nested_non_empty_str`] explicitly.
//!
//! # Examples
//!
//! ```rust
//! use forge_intake_core::field_access::{nested_get, nested_u64, PathSegment};
//! use serde_json::json;
//!
//! let payload = json!({"pull_request": {"number": 0, "draft": false}});
//!
//! assert_eq!(nested_u64(&payload, &["pull_request", "number"]), Some(0));
//! assert_eq!(
//!     nested_get(&payload, &["pull_request", "draft"]),
//!     Some(&json!(false))
//! );
//!
//! let mixed = json!({"commits": [{"id": "abc"}]});
//! let path = [PathSegment::from("commits"), PathSegment::Index(0), PathSegment::from("id")];
//! assert_eq!(nested_get(&mixed, &path), Some(&json!("abc")));
//! ```

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Path segments
// ============================================================================

/// One step of a lookup path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match self {
            PathSegment::Key(key) => value.as_object()?.get(key),
            PathSegment::Index(index) => value.as_array()?.get(*index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Anything usable as a single lookup step.
///
/// Implemented for plain `&str` keys so the common all-keys path can be
/// written as `&["repository", "owner", "login"]`.
pub trait Segment {
    fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value>;
}

impl Segment for &str {
    fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.as_object()?.get(*self)
    }
}

impl Segment for PathSegment {
    fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.step(value)
    }
}

// ============================================================================
// FieldPath
// ============================================================================

/// A validated lookup path, usually parsed from dotted text.
///
/// Purely numeric segments address array elements, so
/// `"environments_requested.0.os.compose"` walks into the first element of
/// the `environments_requested` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// Create a path from explicit segments.
    ///
    /// # Errors
    ///
    /// Returns [`FieldPathError::Empty`] for an empty segment list and
    /// [`FieldPathError::EmptySegment`] when a key segment is empty.
    pub fn new(segments: Vec<PathSegment>) -> Result<Self, FieldPathError> {
        if segments.is_empty() {
            return Err(FieldPathError::Empty);
        }

        if let Some(position) = segments
            .iter()
            .position(|s| matches!(s, PathSegment::Key(k) if k.is_empty()))
        {
            return Err(FieldPathError::EmptySegment {
                path: render(&segments),
                position,
            });
        }

        Ok(Self(segments))
    }

    /// Path segments in lookup order
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Resolve the path against a payload
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        nested_get(root, self.0.as_slice())
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FieldPathError::Empty);
        }

        let mut segments = Vec::new();
        for (position, part) in s.split('.').enumerate() {
            if part.is_empty() {
                return Err(FieldPathError::EmptySegment {
                    path: s.to_string(),
                    position,
                });
            }

            let segment = if part.bytes().all(|b| b.is_ascii_digit()) {
                match part.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Key(part.to_string()),
                }
            } else {
                PathSegment::Key(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self(segments))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.0))
    }
}

fn render(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Error raised for malformed lookup paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    #[error("Field path must contain at least one segment")]
    Empty,

    #[error("Field path '{path}' has an empty segment at position {position}")]
    EmptySegment { path: String, position: usize },
}

// ============================================================================
// Lookup helpers
// ============================================================================

/// Walk `path` from `root`, returning `None` on the first missing step.
///
/// `null` leaves are reported as absent.
pub fn nested_get<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |current, segment| segment.lookup(current))
        .filter(|v| !v.is_null())
}

/// Like [`nested_get`] but returns `default` when the path is absent.
pub fn nested_get_or<'a, S: Segment>(root: &'a Value, path: &[S], default: &'a Value) -> &'a Value {
    nested_get(root, path).unwrap_or(default)
}

/// String value at `path`
pub fn nested_str<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a str> {
    nested_get(root, path)?.as_str()
}

/// Non-empty string value at `path`
pub fn nested_non_empty_str<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a str> {
    nested_str(root, path).filter(|s| !s.is_empty())
}

/// Unsigned integer at `path`
///
/// Numeric strings are accepted since several bus producers send ids as text.
pub fn nested_u64<S: Segment>(root: &Value, path: &[S]) -> Option<u64> {
    let value = nested_get(root, path)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Signed integer at `path`
pub fn nested_i64<S: Segment>(root: &Value, path: &[S]) -> Option<i64> {
    nested_get(root, path)?.as_i64()
}

/// Boolean at `path`
pub fn nested_bool<S: Segment>(root: &Value, path: &[S]) -> Option<bool> {
    nested_get(root, path)?.as_bool()
}

/// Array at `path`
pub fn nested_array<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a Vec<Value>> {
    nested_get(root, path)?.as_array()
}

/// Object at `path`
pub fn nested_object<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a Map<String, Value>> {
    nested_get(root, path)?.as_object()
}

/// Value at `path` when it is present and non-empty.
///
/// This is the marker check extractors use: `false`, `0`, `""`, `[]` and
/// `{}` are treated like an absent field.
pub fn nested_truthy<'a, S: Segment>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    nested_get(root, path).filter(|v| is_truthy(v))
}

/// Whether a value counts as set for marker checks
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a scalar as text, used for fields that arrive as either strings or numbers.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "field_access_tests.rs"]
mod tests;
