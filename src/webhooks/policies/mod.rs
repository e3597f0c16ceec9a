//! Admission policies, one per resource kind.
//!
//! Each resource implements [`AdmissionPolicy`]: a defaulter plus create,
//! update and delete validators. Validators never short-circuit; they return
//! every violation they find in a [`ValidationResult`].
//!
//! Update validators compare the *normalized* forms of both objects (see
//! [`DefaultingMode::Comparison`]) so a default applied to the new object but
//! missing from the stored one is never reported as a change.

pub mod cluster;
pub mod cluster_identity;
pub mod control_plane;
pub mod control_plane_template;
pub mod machine;
pub mod machine_pool;
pub mod machine_template;

use kube::Resource;
use kube::core::ObjectMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::validation::{ErrorList, FieldError, FieldPath, format};

pub use crate::webhooks::context::AdmissionContext;

/// Result of running a validator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationResult {
    /// Non-fatal advisories returned even when the request is allowed.
    pub warnings: Vec<String>,
    /// Violations, sorted by path then kind.
    pub errors: ErrorList,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self::default()
    }

    pub fn new(mut errors: ErrorList, warnings: Vec<String>) -> Self {
        errors.sort();
        Self { warnings, errors }
    }

    pub fn is_allowed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl From<ErrorList> for ValidationResult {
    fn from(errors: ErrorList) -> Self {
        Self::new(errors, Vec::new())
    }
}

impl From<FieldError> for ValidationResult {
    fn from(error: FieldError) -> Self {
        Self::new(std::iter::once(error).collect(), Vec::new())
    }
}

/// Which defaults a defaulter may apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultingMode {
    /// Every default, including generated keys and identifiers.
    Admission,
    /// Deterministic defaults only. Used to normalize both sides of an
    /// update before comparing them.
    Comparison,
}

/// Inputs to a defaulter.
#[derive(Clone, Copy, Debug)]
pub struct DefaultingContext<'a> {
    pub mode: DefaultingMode,
    /// Subscription written into objects that leave `subscriptionID` empty.
    pub subscription_id: Option<&'a str>,
}

impl<'a> DefaultingContext<'a> {
    pub fn admission(subscription_id: Option<&'a str>) -> Self {
        Self {
            mode: DefaultingMode::Admission,
            subscription_id,
        }
    }

    pub fn comparison() -> Self {
        Self {
            mode: DefaultingMode::Comparison,
            subscription_id: None,
        }
    }

    /// Whether non-deterministic defaults (keys, UUIDs) may be generated.
    pub fn generates(&self) -> bool {
        self.mode == DefaultingMode::Admission
    }
}

/// Defaulting and validation for one resource kind.
pub trait AdmissionPolicy:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync
{
    /// Fill unset fields. Idempotent; never clears a field.
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()>;

    fn validate_create(&self, ctx: &AdmissionContext<'_>) -> ValidationResult;

    fn validate_update(&self, old: &Self, ctx: &AdmissionContext<'_>) -> ValidationResult;

    fn validate_delete(&self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        ValidationResult::allowed()
    }
}

/// A copy of `obj` with the deterministic defaults applied.
pub fn normalized<T: AdmissionPolicy>(obj: &T) -> std::result::Result<T, FieldError> {
    let mut copy = obj.clone();
    copy.apply_defaults(&DefaultingContext::comparison())
        .map_err(|e| FieldError::internal(&FieldPath::default(), e.to_string()))?;
    Ok(copy)
}

/// Serialized form of a (sub)object, for the diff-based rules.
pub fn serialized<T: Serialize>(value: &T, path: &FieldPath) -> std::result::Result<Value, FieldError> {
    serde_json::to_value(value).map_err(|e| FieldError::internal(path, e.to_string()))
}

pub fn object_name(meta: &ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

/// Reserved-word check on `metadata.name`.
pub fn validate_object_name(meta: &ObjectMeta) -> Option<FieldError> {
    format::resource_name(object_name(meta), &FieldPath::new("metadata").child("name"))
}

/// Upgrade-only version transitions.
///
/// A downgrade or major change is an error; skipping a minor release is a
/// warning.
pub fn validate_version_change(
    old: &str,
    new: &str,
    path: &FieldPath,
) -> (Option<FieldError>, Option<String>) {
    if old == new {
        return (None, None);
    }
    let (Some(before), Some(after)) = (
        format::parse_kubernetes_version(old),
        format::parse_kubernetes_version(new),
    ) else {
        // malformed versions are reported by the format rules
        return (None, None);
    };

    if after < before {
        return (
            Some(FieldError::forbidden(
                path,
                format!("version cannot be downgraded from {} to {}", old, new),
            )),
            None,
        );
    }
    if after.major != before.major {
        return (
            Some(FieldError::forbidden(
                path,
                format!("major version cannot change from {} to {}", old, new),
            )),
            None,
        );
    }
    if after.minor > before.minor + 1 {
        return (
            None,
            Some(format!(
                "Version upgrade from {} to {} skips a minor release",
                old, new
            )),
        );
    }
    (None, None)
}

/// Validate a bounded optional integer field.
pub(crate) fn check_bounds(
    errors: &mut ErrorList,
    value: Option<i32>,
    lo: i64,
    hi: i64,
    path: &FieldPath,
) {
    if let Some(v) = value {
        errors.extend(format::bounded(i64::from(v), lo, hi, path));
    }
}
