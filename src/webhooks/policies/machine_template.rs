//! AzureMachineTemplate defaulting and validation.
//!
//! A template's machine spec is frozen after creation. The only accepted
//! change is moving the legacy `subnetName`/`acceleratedNetworking` pair
//! into a single network interface.

use std::collections::BTreeSet;

use super::machine::{SpecOwner, default_machine_spec, validate_machine_spec};
use super::{AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, normalized, serialized};
use crate::crd::AzureMachineTemplate;
use crate::error::Result;
use crate::validation::immutability::{self, NETWORK_INTERFACE_PATHS};
use crate::validation::{ErrorList, FieldDiff, FieldError, FieldPath, Mutability};

fn template_spec_path() -> FieldPath {
    FieldPath::new("spec").child("template").child("spec")
}

/// First path segment beneath `root`, e.g. `osDisk` for
/// `spec.template.spec.osDisk.cachingType`.
fn top_level_field<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?.strip_prefix('.')?;
    let end = rest.find(['.', '[']).unwrap_or(rest.len());
    Some(&rest[..end])
}

impl AdmissionPolicy for AzureMachineTemplate {
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()> {
        default_machine_spec(&mut self.spec.template.spec, SpecOwner::Template, ctx)
    }

    fn validate_create(&self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        validate_machine_spec(&self.spec.template.spec, &template_spec_path(), SpecOwner::Template)
    }

    fn validate_update(&self, old: &Self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        let root = template_spec_path();
        let (old, new) = match (normalized(old), normalized(self)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };
        let (old_value, new_value) = match (
            serialized(&old.spec.template.spec, &root),
            serialized(&new.spec.template.spec, &root),
        ) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };

        let excluded: Vec<String> = NETWORK_INTERFACE_PATHS
            .iter()
            .map(|field| root.child(field).as_str().to_string())
            .collect();
        let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();

        let diff = FieldDiff::from_values(&old_value, &new_value, &root);
        let changed: BTreeSet<&str> = diff
            .without(&excluded)
            .filter_map(|path| top_level_field(path, root.as_str()))
            .collect();

        let mut errors: ErrorList = changed
            .into_iter()
            .map(|field| {
                FieldError::forbidden(&root.child(field), "AzureMachineTemplate spec is immutable")
            })
            .collect();
        errors.extend(immutability::network_interfaces(
            &old_value,
            &new_value,
            &root,
            Mutability::Immutable,
        ));
        ValidationResult::from(errors)
    }
}
