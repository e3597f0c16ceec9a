//! AzureClusterIdentity validation. No defaults.

use super::{AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult};
use crate::crd::{AzureClusterIdentity, AzureClusterIdentitySpec, IdentityType};
use crate::error::Result;
use crate::validation::{ErrorList, FieldError, FieldPath};

fn validate_spec(spec: &AzureClusterIdentitySpec, root: &FieldPath) -> ErrorList {
    let mut errors = ErrorList::new();

    if spec.client_id.is_empty() {
        errors.push(FieldError::required(&root.child("clientID"), "client ID is required"));
    }
    if spec.tenant_id.is_empty() {
        errors.push(FieldError::required(&root.child("tenantID"), "tenant ID is required"));
    }

    let resource_id = spec.resource_id.as_deref().unwrap_or_default();
    match (spec.identity_type, resource_id.is_empty()) {
        (IdentityType::UserAssignedMSI, true) => errors.push(FieldError::required(
            &root.child("resourceID"),
            "resource ID is required for UserAssignedMSI",
        )),
        (IdentityType::UserAssignedMSI, false) | (_, true) => {}
        (other, false) => errors.push(FieldError::forbidden(
            &root.child("resourceID"),
            format!("resource ID is only supported for UserAssignedMSI, not {:?}", other),
        )),
    }

    let secret_missing = spec.client_secret.as_ref().is_none_or(|s| s.name.is_empty());
    if spec.identity_type.needs_secret() && secret_missing {
        errors.push(FieldError::required(
            &root.child("clientSecret").child("name"),
            format!("client secret is required for {:?}", spec.identity_type),
        ));
    }
    errors
}

impl AdmissionPolicy for AzureClusterIdentity {
    fn apply_defaults(&mut self, _ctx: &DefaultingContext<'_>) -> Result<()> {
        Ok(())
    }

    fn validate_create(&self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        ValidationResult::from(validate_spec(&self.spec, &FieldPath::new("spec")))
    }

    fn validate_update(&self, old: &Self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        let root = FieldPath::new("spec");
        let mut errors = validate_spec(&self.spec, &root);
        if old.spec.identity_type != self.spec.identity_type {
            errors.push(FieldError::forbidden(&root.child("type"), "field is immutable"));
        }
        ValidationResult::from(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SecretReference;
    use crate::webhooks::context::FeatureGateSet;

    fn identity(identity_type: IdentityType) -> AzureClusterIdentity {
        AzureClusterIdentity::new(
            "identity",
            AzureClusterIdentitySpec {
                identity_type,
                client_id: "client".to_string(),
                tenant_id: "tenant".to_string(),
                resource_id: None,
                client_secret: Some(SecretReference {
                    name: "secret".to_string(),
                    namespace: None,
                }),
                allowed_namespaces: None,
            },
        )
    }

    fn create(i: &AzureClusterIdentity) -> ValidationResult {
        let gates = FeatureGateSet::default();
        i.validate_create(&AdmissionContext::new(&gates, None))
    }

    #[test]
    fn test_service_principal_valid() {
        assert!(create(&identity(IdentityType::ServicePrincipal)).is_allowed());
    }

    #[test]
    fn test_msi_requires_resource_id() {
        let mut i = identity(IdentityType::UserAssignedMSI);
        assert!(create(&i).errors.has_path("spec.resourceID"));
        i.spec.resource_id = Some("/subscriptions/x/identities/y".to_string());
        assert!(create(&i).is_allowed());
    }

    #[test]
    fn test_resource_id_forbidden_for_other_types() {
        let mut i = identity(IdentityType::WorkloadIdentity);
        i.spec.resource_id = Some("id".to_string());
        assert!(create(&i).errors.has_path("spec.resourceID"));
    }

    #[test]
    fn test_certificate_requires_secret() {
        let mut i = identity(IdentityType::ServicePrincipalCertificate);
        i.spec.client_secret = None;
        assert!(create(&i).errors.has_path("spec.clientSecret.name"));

        let mut i = identity(IdentityType::ManualServicePrincipal);
        i.spec.client_secret = None;
        assert!(create(&i).is_allowed());
    }

    #[test]
    fn test_type_immutable() {
        let old = identity(IdentityType::ServicePrincipal);
        let new = identity(IdentityType::ManualServicePrincipal);
        let gates = FeatureGateSet::default();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        assert!(result.errors.has_path("spec.type"));
    }
}
