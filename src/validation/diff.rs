//! Field-diff helper.
//!
//! Walks two serialized forms of the same resource and records every leaf
//! path whose value differs. Update validators ask "did X change?" through
//! [`FieldDiff::touches`] instead of comparing fields one by one.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use super::field::FieldPath;

static NULL: Value = Value::Null;

/// The set of changed leaf paths between two documents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDiff {
    paths: BTreeSet<String>,
}

impl FieldDiff {
    /// Diff two typed values after serializing them to JSON.
    pub fn between<T: Serialize>(old: &T, new: &T) -> Result<Self, serde_json::Error> {
        let old = serde_json::to_value(old)?;
        let new = serde_json::to_value(new)?;
        Ok(Self::from_values(&old, &new, &FieldPath::default()))
    }

    /// Diff two JSON values, reporting paths relative to `root`.
    pub fn from_values(old: &Value, new: &Value, root: &FieldPath) -> Self {
        let mut diff = Self::default();
        diff.walk(old, new, root);
        diff
    }

    fn walk(&mut self, old: &Value, new: &Value, path: &FieldPath) {
        match (absent_if_empty(old), absent_if_empty(new)) {
            (None, None) => {}
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
                for key in keys {
                    self.walk(
                        a.get(key).unwrap_or(&NULL),
                        b.get(key).unwrap_or(&NULL),
                        &path.child(key),
                    );
                }
            }
            (Some(Value::Array(a)), Some(Value::Array(b))) => {
                for i in 0..a.len().max(b.len()) {
                    self.walk(
                        a.get(i).unwrap_or(&NULL),
                        b.get(i).unwrap_or(&NULL),
                        &path.index(i),
                    );
                }
            }
            (a, b) if a == b => {}
            _ => {
                self.paths.insert(path.as_str().to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Whether `prefix` or anything beneath it changed.
    pub fn touches(&self, prefix: &str) -> bool {
        self.paths.iter().any(|p| is_under(p, prefix))
    }

    /// Changed paths that are not under any of `excluded`.
    pub fn without<'a>(&'a self, excluded: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.paths()
            .filter(move |p| !excluded.iter().any(|prefix| is_under(p, prefix)))
    }
}

/// `path` equals `prefix` or is nested beneath it.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

// null, "", [] and {} all mean "unset" once serialized.
fn absent_if_empty(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other),
    }
}
