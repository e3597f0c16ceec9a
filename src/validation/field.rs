//! Structured field errors.
//!
//! Every validator reports violations as [`FieldError`]s addressed by a
//! [`FieldPath`] in dot/bracket notation (`spec.networkInterfaces[0].subnetName`).
//! Errors are collected into an [`ErrorList`] instead of short-circuiting so a
//! client sees every violation in one round trip.

use std::fmt;

use thiserror::Error;

/// Path to a field inside a resource, rendered in dot/bracket notation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    /// Create a root path (e.g. `spec` or `metadata`).
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    /// Path of a named child field.
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    /// Path of a list element.
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    /// Path of a map entry.
    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}[{}]", self.0, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of a field error.
///
/// Declaration order is the rule order used when sorting an [`ErrorList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// The value does not parse or is out of range.
    Invalid,
    /// A required field is unset or empty.
    Required,
    /// An update changes a field that cannot change.
    Forbidden,
    /// A cross-field rule fails.
    Conflict,
    /// The operation or value is not supported (e.g. feature gate disabled).
    NotSupported,
    /// Logic error upstream of the validator.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Invalid => write!(f, "Invalid value"),
            ErrorKind::Required => write!(f, "Required value"),
            ErrorKind::Forbidden => write!(f, "Forbidden"),
            ErrorKind::Conflict => write!(f, "Invalid combination"),
            ErrorKind::NotSupported => write!(f, "Unsupported value"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// A single violation on a single field.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{path}: {kind}{}: {detail}", render_value(.value))]
pub struct FieldError {
    pub kind: ErrorKind,
    pub path: FieldPath,
    /// The offending value, when it is meaningful to echo it back.
    pub value: Option<String>,
    pub detail: String,
}

fn render_value(value: &Option<String>) -> String {
    match value {
        Some(v) => format!(": {:?}", v),
        None => String::new(),
    }
}

impl FieldError {
    pub fn new(kind: ErrorKind, path: &FieldPath, value: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.clone(),
            value,
            detail: detail.into(),
        }
    }

    pub fn invalid(path: &FieldPath, value: impl ToString, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, path, Some(value.to_string()), detail)
    }

    pub fn required(path: &FieldPath, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Required, path, None, detail)
    }

    pub fn forbidden(path: &FieldPath, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, path, None, detail)
    }

    pub fn conflict(path: &FieldPath, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, path, None, detail)
    }

    pub fn not_supported(path: &FieldPath, value: impl ToString, valid: &[&str]) -> Self {
        Self::new(
            ErrorKind::NotSupported,
            path,
            Some(value.to_string()),
            format!("supported values: {}", valid.join(", ")),
        )
    }

    /// The operation is not supported in the current configuration.
    pub fn unsupported(path: &FieldPath, value: Option<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, path, value, detail)
    }

    pub fn internal(path: &FieldPath, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, path, None, detail)
    }
}

/// An ordered collection of field errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Sort by path, then by rule. The sort is stable so errors on the same
    /// path and rule keep their insertion order.
    pub fn sort(&mut self) {
        self.0
            .sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.kind.cmp(&b.kind)));
    }

    /// Errors reported on exactly `path`.
    pub fn on_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| e.path.as_str() == path)
    }

    /// Whether any error was reported on exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.on_path(path).next().is_some()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        if rendered.len() == 1 {
            write!(f, "{}", rendered.join(""))
        } else {
            write!(f, "[{}]", rendered.join(", "))
        }
    }
}

impl Extend<FieldError> for ErrorList {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
