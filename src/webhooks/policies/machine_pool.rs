//! AzureManagedMachinePool defaulting and validation.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, check_bounds,
    normalized, object_name, serialized,
};
use crate::crd::{AzureManagedMachinePool, NodePoolMode, OsDiskType, OsType};
use crate::error::Result;
use crate::validation::format;
use crate::validation::immutability::{self, Rule};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::context::Feature;

/// Label prefix reserved for AKS itself.
pub const RESERVED_LABEL_PREFIX: &str = "kubernetes.azure.com";

/// Maximum agent pool name length for Windows pools.
pub const WINDOWS_POOL_NAME_MAX: usize = 6;

static POOL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| format::compile(r"^[a-z][a-z0-9]{0,11}$"));

pub const MACHINE_POOL_RULES: &[Rule] = &[
    Rule::immutable("name"),
    Rule::immutable("sku"),
    Rule::immutable("osDiskSizeGB"),
    Rule::immutable("availabilityZones"),
    Rule::immutable("maxPods"),
    Rule::immutable("osDiskType"),
    Rule::immutable("osType"),
    Rule::immutable("enableUltraSSD"),
    Rule::immutable("enableNodePublicIP"),
    Rule::immutable("nodePublicIPPrefixID"),
    Rule::immutable("scaleSetPriority"),
    Rule::immutable("subnetName"),
];

fn validate_pool_name(pool: &AzureManagedMachinePool, path: &FieldPath) -> Option<FieldError> {
    let name = pool
        .spec
        .name
        .as_deref()
        .unwrap_or_else(|| object_name(&pool.metadata));

    if !POOL_NAME_RE.is_match(name) {
        return Some(FieldError::invalid(
            path,
            name,
            "must start with a lowercase letter and contain at most 12 lowercase alphanumeric characters",
        ));
    }
    if pool.spec.os_type == Some(OsType::Windows) && name.len() > WINDOWS_POOL_NAME_MAX {
        return Some(FieldError::invalid(
            path,
            name,
            format!("Windows pool names must be at most {} characters", WINDOWS_POOL_NAME_MAX),
        ));
    }
    None
}

/// Rules that hold for every version of the object, on create and update.
fn validate_spec(pool: &AzureManagedMachinePool) -> ErrorList {
    let spec = &pool.spec;
    let path = FieldPath::new("spec");
    let mut errors = ErrorList::new();

    if spec.mode.is_none() {
        errors.push(FieldError::required(&path.child("mode"), "mode is required"));
    }
    if spec.os_type == Some(OsType::Windows) && spec.mode == Some(NodePoolMode::System) {
        errors.push(FieldError::conflict(
            &path.child("mode"),
            "Windows pools cannot be System pools",
        ));
    }

    if let Some(scaling) = &spec.scaling {
        let scaling_path = path.child("scaling");
        let floor = if spec.mode == Some(NodePoolMode::System) { 1 } else { 0 };
        if let Some(min) = scaling.min_size {
            if min < floor {
                errors.push(FieldError::invalid(
                    &scaling_path.child("minSize"),
                    min,
                    format!("must be at least {}", floor),
                ));
            }
        }
        if let (Some(min), Some(max)) = (scaling.min_size, scaling.max_size) {
            if min > max {
                errors.push(FieldError::conflict(
                    &scaling_path,
                    "minSize must not exceed maxSize",
                ));
            }
        }
    }

    let labels = path.child("nodeLabels");
    for key in spec.node_labels.keys() {
        if key.starts_with(RESERVED_LABEL_PREFIX) {
            errors.push(FieldError::invalid(
                &labels.key(key),
                key,
                format!("label keys must not use the reserved prefix {}", RESERVED_LABEL_PREFIX),
            ));
        }
    }

    for (i, taint) in spec.taints.iter().enumerate() {
        if taint.key.is_empty() {
            errors.push(FieldError::required(
                &path.child("taints").index(i).child("key"),
                "taint key is required",
            ));
        }
    }
    errors
}

/// Rules on fields that are frozen after creation.
fn validate_create_only(pool: &AzureManagedMachinePool) -> ErrorList {
    let spec = &pool.spec;
    let path = FieldPath::new("spec");
    let mut errors = ErrorList::new();

    errors.extend(validate_pool_name(pool, &path.child("name")));
    if spec.sku.is_empty() {
        errors.push(FieldError::required(&path.child("sku"), "sku is required"));
    }
    check_bounds(&mut errors, spec.max_pods, 10, 250, &path.child("maxPods"));
    check_bounds(&mut errors, spec.os_disk_size_gb, 30, 2048, &path.child("osDiskSizeGB"));

    if spec.node_public_ip_prefix_id.is_some() && spec.enable_node_public_ip != Some(true) {
        errors.push(FieldError::conflict(
            &path.child("nodePublicIPPrefixID"),
            "enableNodePublicIP must be true when nodePublicIPPrefixID is set",
        ));
    }
    errors
}

impl AdmissionPolicy for AzureManagedMachinePool {
    fn apply_defaults(&mut self, _ctx: &DefaultingContext<'_>) -> Result<()> {
        if self.spec.name.as_deref().is_none_or(str::is_empty) {
            self.spec.name = Some(object_name(&self.metadata).to_string());
        }
        self.spec.os_type.get_or_insert(OsType::Linux);
        self.spec.os_disk_type.get_or_insert(OsDiskType::Managed);
        Ok(())
    }

    fn validate_create(&self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let mut errors = ErrorList::new();
        errors.extend(ctx.require_gate(Feature::MachinePool, &FieldPath::new("spec")));
        errors.extend(validate_spec(self));
        errors.extend(validate_create_only(self));
        ValidationResult::from(errors)
    }

    fn validate_update(&self, old: &Self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        let path = FieldPath::new("spec");
        let (old, new) = match (normalized(old), normalized(self)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };
        let (old_value, new_value) = match (serialized(&old.spec, &path), serialized(&new.spec, &path)) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };

        let mut errors = validate_spec(&new);
        errors.extend(immutability::check(&old_value, &new_value, &path, MACHINE_POOL_RULES));
        ValidationResult::from(errors)
    }

    fn validate_delete(&self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let request = match ctx.request() {
            Ok(request) => request,
            Err(err) => return ValidationResult::from(err),
        };

        let result = ValidationResult::allowed();
        if self.spec.mode == Some(NodePoolMode::System) {
            info!(
                uid = %request.uid,
                name = %object_name(&self.metadata),
                dry_run = request.dry_run,
                "Deleting System machine pool"
            );
            return result.with_warning(format!(
                "AzureManagedMachinePool {} is a System pool; the cluster needs at least one System pool to stay healthy",
                object_name(&self.metadata)
            ));
        }
        result
    }
}
