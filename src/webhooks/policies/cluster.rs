//! AzureManagedCluster defaulting and validation.

use std::collections::BTreeSet;

use super::control_plane::DEFAULT_VNET_CIDR;
use super::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, normalized,
    object_name, serialized, validate_object_name,
};
use crate::crd::{AzureManagedCluster, NetworkSpec, ObjectReference};
use crate::error::Result;
use crate::validation::format;
use crate::validation::immutability::{self, Rule};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::context::Feature;

pub const CLUSTER_RULES: &[Rule] = &[
    Rule::once_set("subscriptionID"),
    Rule::once_set("location"),
    Rule::once_set("networkSpec.vnet"),
    Rule::once_set("controlPlaneRef"),
    Rule::once_set("infrastructureRef"),
    Rule::once_set("identityRef"),
    Rule::once_set("controlPlaneEndpoint"),
];

fn check_reference_kind(
    reference: Option<&ObjectReference>,
    expected: &str,
    path: &FieldPath,
) -> Option<FieldError> {
    let kind = reference?.kind.as_deref()?;
    (kind != expected).then(|| FieldError::not_supported(&path.child("kind"), kind, &[expected]))
}

fn validate_network(network: &NetworkSpec, path: &FieldPath) -> ErrorList {
    let mut errors = ErrorList::new();

    if let Some(cidr) = network.vnet.cidr_block.as_deref() {
        errors.extend(format::cidr(cidr, &path.child("vnet").child("cidrBlock")));
    }

    let mut seen = BTreeSet::new();
    for (i, subnet) in network.subnets.iter().enumerate() {
        let subnet_path = path.child("subnets").index(i);
        if subnet.name.is_empty() {
            errors.push(FieldError::required(&subnet_path.child("name"), "subnet name is required"));
        } else if !seen.insert(subnet.name.as_str()) {
            errors.push(FieldError::invalid(
                &subnet_path.child("name"),
                &subnet.name,
                "subnet names must be unique",
            ));
        }
        if let Some(cidr) = subnet.cidr_block.as_deref() {
            errors.extend(format::cidr(cidr, &subnet_path.child("cidrBlock")));
        }
    }
    errors
}

fn validate_spec(cluster: &AzureManagedCluster) -> ErrorList {
    let spec = &cluster.spec;
    let path = FieldPath::new("spec");
    let mut errors = ErrorList::new();

    if spec.location.is_empty() {
        errors.push(FieldError::required(&path.child("location"), "location is required"));
    }
    if let Some(network) = &spec.network_spec {
        errors.extend(validate_network(network, &path.child("networkSpec")));
    }
    errors.extend(check_reference_kind(
        spec.control_plane_ref.as_ref(),
        "AzureManagedControlPlane",
        &path.child("controlPlaneRef"),
    ));
    errors.extend(check_reference_kind(
        spec.identity_ref.as_ref(),
        "AzureClusterIdentity",
        &path.child("identityRef"),
    ));

    let tags = path.child("additionalTags");
    if spec.additional_tags.keys().any(String::is_empty) {
        errors.push(FieldError::invalid(&tags, "", "tag keys must not be empty"));
    }
    errors
}

impl AdmissionPolicy for AzureManagedCluster {
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()> {
        let name = object_name(&self.metadata).to_string();
        let spec = &mut self.spec;

        if spec.subscription_id.as_deref().is_none_or(str::is_empty) {
            if let Some(subscription) = ctx.subscription_id.filter(|_| ctx.generates()) {
                spec.subscription_id = Some(subscription.to_string());
            }
        }

        let vnet = &mut spec.network_spec.get_or_insert_with(NetworkSpec::default).vnet;
        if vnet.name.as_deref().is_none_or(str::is_empty) {
            vnet.name = Some(name);
        }
        if vnet.cidr_block.as_deref().is_none_or(str::is_empty) {
            vnet.cidr_block = Some(DEFAULT_VNET_CIDR.to_string());
        }
        Ok(())
    }

    fn validate_create(&self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let mut errors = ErrorList::new();
        errors.extend(ctx.require_gate(Feature::Aks, &FieldPath::new("spec")));
        errors.extend(validate_object_name(&self.metadata));
        errors.extend(validate_spec(self));

        if !self.spec.control_plane_endpoint.is_zero() {
            errors.push(FieldError::invalid(
                &FieldPath::new("spec").child("controlPlaneEndpoint"),
                format!(
                    "{}:{}",
                    self.spec.control_plane_endpoint.host, self.spec.control_plane_endpoint.port
                ),
                "field is set by the controller and must be empty at creation",
            ));
        }
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
        errors.extend(immutability::check(&old_value, &new_value, &path, CLUSTER_RULES));
        ValidationResult::from(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crd::{AzureManagedClusterSpec, SubnetSpec};
    use crate::validation::ErrorKind;
    use crate::webhooks::context::FeatureGateSet;

    fn cluster() -> AzureManagedCluster {
        AzureManagedCluster::new(
            "cluster",
            AzureManagedClusterSpec {
                location: "westeurope".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_defaults() {
        let mut c = cluster();
        c.apply_defaults(&DefaultingContext::admission(Some("sub"))).unwrap();
        assert_eq!(c.spec.subscription_id.as_deref(), Some("sub"));
        let vnet = &c.spec.network_spec.as_ref().unwrap().vnet;
        assert_eq!(vnet.name.as_deref(), Some("cluster"));
        assert_eq!(vnet.cidr_block.as_deref(), Some("10.0.0.0/8"));
    }

    #[test]
    fn test_create_requires_aks_gate() {
        let c = cluster();
        let gates = FeatureGateSet::default();
        let result = c.validate_create(&AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors.iter().next().unwrap().kind, ErrorKind::NotSupported);
    }

    #[test]
    fn test_duplicate_subnets() {
        let mut c = cluster();
        c.spec.network_spec = Some(NetworkSpec {
            subnets: vec![
                SubnetSpec {
                    name: "nodes".to_string(),
                    cidr_block: Some("10.1.0.0/16".to_string()),
                },
                SubnetSpec {
                    name: "nodes".to_string(),
                    cidr_block: Some("10.1.0.0".to_string()),
                },
            ],
            ..Default::default()
        });
        let gates = FeatureGateSet::all_enabled();
        let result = c.validate_create(&AdmissionContext::new(&gates, None));
        assert!(result.errors.has_path("spec.networkSpec.subnets[1].name"));
        assert!(result.errors.has_path("spec.networkSpec.subnets[1].cidrBlock"));
    }

    #[test]
    fn test_control_plane_ref_kind() {
        let mut c = cluster();
        c.spec.control_plane_ref = Some(ObjectReference {
            kind: Some("KubeadmControlPlane".to_string()),
            name: Some("cp".to_string()),
            ..Default::default()
        });
        let gates = FeatureGateSet::all_enabled();
        let result = c.validate_create(&AdmissionContext::new(&gates, None));
        assert!(result.errors.has_path("spec.controlPlaneRef.kind"));
    }

    #[test]
    fn test_tag_keys() {
        let mut c = cluster();
        c.spec
            .additional_tags
            .insert("windows-team".to_string(), "infra".to_string());
        let gates = FeatureGateSet::all_enabled();
        assert!(c.validate_create(&AdmissionContext::new(&gates, None)).is_allowed());

        c.spec.additional_tags.insert(String::new(), "x".to_string());
        let result = c.validate_create(&AdmissionContext::new(&gates, None));
        assert!(result.errors.has_path("spec.additionalTags"));
    }

    #[test]
    fn test_location_immutable() {
        let old = cluster();
        let mut new = old.clone();
        new.spec.location = "eastus".to_string();
        let gates = FeatureGateSet::all_enabled();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        assert!(result.errors.has_path("spec.location"));
    }
}
