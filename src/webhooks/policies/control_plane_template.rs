//! AzureManagedControlPlaneTemplate defaulting and validation.
//!
//! Runs the class-level control plane rules re-rooted at
//! `spec.template.spec`.

use super::control_plane::{default_class, validate_class, validate_class_update};
use super::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, normalized, serialized,
};
use crate::crd::AzureManagedControlPlaneTemplate;
use crate::error::Result;
use crate::validation::{ErrorList, FieldPath};
use crate::webhooks::context::Feature;

fn class_root() -> FieldPath {
    FieldPath::new("spec").child("template").child("spec")
}

impl AdmissionPolicy for AzureManagedControlPlaneTemplate {
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()> {
        default_class(&mut self.spec.template.spec, None, ctx);
        Ok(())
    }

    fn validate_create(&self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let mut errors = ErrorList::new();
        errors.extend(ctx.require_gate(Feature::MachinePool, &FieldPath::new("spec")));
        errors.extend(validate_class(&self.spec.template.spec, &class_root()));
        ValidationResult::from(errors)
    }

    fn validate_update(&self, old: &Self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        let root = class_root();
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

        validate_class_update(
            &old.spec.template.spec,
            &new.spec.template.spec,
            &old_value,
            &new_value,
            &root,
        )
    }
}
