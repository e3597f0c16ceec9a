//! AzureManagedControlPlane defaulting and validation.
//!
//! The class-level functions (`default_class`, `validate_class`,
//! `validate_class_update`) are shared with the control plane template and
//! take the root path their fields live under.

use tracing::debug;

use super::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, check_bounds,
    normalized, object_name, serialized, validate_object_name, validate_version_change,
};
use crate::crd::{
    AksSku, AutoScalerProfile, AzureManagedControlPlane, AzureManagedControlPlaneClassSpec,
    EXPANDERS, KnobKind, LoadBalancerSku, ManagedControlPlaneSubnet,
    ManagedControlPlaneVirtualNetwork, NetworkPlugin, NetworkPolicy, SkuTier,
};
use crate::error::Result;
use crate::validation::format::{self, Cidr};
use crate::validation::immutability::{self, Rule};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::context::Feature;
use crate::webhooks::keygen;

pub const DEFAULT_VNET_CIDR: &str = "10.0.0.0/8";
pub const DEFAULT_SUBNET_CIDR: &str = "10.240.0.0/16";

/// Class fields that may be set once and never changed.
pub const CLASS_RULES: &[Rule] = &[
    Rule::once_set("subscriptionID"),
    Rule::once_set("location"),
    Rule::once_set("networkPlugin"),
    Rule::once_set("networkPolicy"),
    Rule::once_set("loadBalancerSKU"),
    Rule::once_set("dnsServiceIP"),
    Rule::once_set("virtualNetwork"),
];

/// Instance-only fields that may be set once and never changed.
pub const INSTANCE_RULES: &[Rule] = &[
    Rule::once_set("resourceGroupName"),
    Rule::once_set("nodeResourceGroupName"),
    Rule::once_set("controlPlaneEndpoint.host"),
    Rule::once_set("controlPlaneEndpoint.port"),
];

fn fill(field: &mut Option<String>, value: &str) {
    if field.as_deref().is_none_or(str::is_empty) {
        *field = Some(value.to_string());
    }
}

/// Fill every unset autoscaler knob from the canonical table.
pub fn default_autoscaler_profile(profile: &mut AutoScalerProfile) {
    fill(&mut profile.balance_similar_node_groups, "false");
    fill(&mut profile.expander, "random");
    fill(&mut profile.max_empty_bulk_delete, "10");
    fill(&mut profile.max_graceful_termination_sec, "600");
    fill(&mut profile.max_node_provision_time, "15m");
    fill(&mut profile.max_total_unready_percentage, "45");
    fill(&mut profile.new_pod_scale_up_delay, "0s");
    fill(&mut profile.ok_total_unready_count, "3");
    fill(&mut profile.scan_interval, "10s");
    fill(&mut profile.scale_down_delay_after_add, "10m");
    let scan_interval = profile.scan_interval.clone().unwrap_or_default();
    fill(&mut profile.scale_down_delay_after_delete, &scan_interval);
    fill(&mut profile.scale_down_delay_after_failure, "3m");
    fill(&mut profile.scale_down_unneeded_time, "10m");
    fill(&mut profile.scale_down_unready_time, "20m");
    fill(&mut profile.scale_down_utilization_threshold, "0.5");
    fill(&mut profile.skip_nodes_with_local_storage, "false");
    fill(&mut profile.skip_nodes_with_system_pods, "true");
}

/// Defaults shared by the instance and the template. `name` is the object
/// name virtual network and subnet names default to; templates pass `None`.
pub fn default_class(
    class: &mut AzureManagedControlPlaneClassSpec,
    name: Option<&str>,
    ctx: &DefaultingContext<'_>,
) {
    if !class.version.is_empty() && !class.version.starts_with('v') {
        class.version = format!("v{}", class.version);
    }

    if class.subscription_id.as_deref().is_none_or(str::is_empty) {
        if let Some(subscription) = ctx.subscription_id.filter(|_| ctx.generates()) {
            class.subscription_id = Some(subscription.to_string());
        }
    }

    class.network_plugin.get_or_insert(NetworkPlugin::Azure);
    class.load_balancer_sku.get_or_insert(LoadBalancerSku::Standard);
    class.sku.get_or_insert(AksSku {
        tier: SkuTier::Free,
    });

    let vnet = class
        .virtual_network
        .get_or_insert_with(ManagedControlPlaneVirtualNetwork::default);
    if let Some(name) = name {
        fill(&mut vnet.name, name);
    }
    fill(&mut vnet.cidr_block, DEFAULT_VNET_CIDR);
    let subnet = vnet
        .subnet
        .get_or_insert_with(ManagedControlPlaneSubnet::default);
    if let Some(name) = name {
        fill(&mut subnet.name, name);
    }
    fill(&mut subnet.cidr_block, DEFAULT_SUBNET_CIDR);

    if let Some(profile) = class.autoscaler_profile.as_mut() {
        default_autoscaler_profile(profile);
    }
}

fn validate_knob(kind: KnobKind, value: &str, path: &FieldPath) -> Option<FieldError> {
    match kind {
        KnobKind::Bool => format::bool_string(value, path),
        KnobKind::Expander => format::one_of(value, EXPANDERS, path),
        KnobKind::NonNegativeInteger => format::non_negative_integer(value, path),
        KnobKind::Percentage => format::integer_in_range(value, 0, 100, path),
        KnobKind::Duration => format::duration(value, path),
        KnobKind::Fraction => format::decimal_fraction(value, path),
    }
}

/// Format and cross-field rules on the class fields.
pub fn validate_class(class: &AzureManagedControlPlaneClassSpec, root: &FieldPath) -> ErrorList {
    let mut errors = ErrorList::new();

    errors.extend(format::kubernetes_version(&class.version, &root.child("version")));

    if let Some(ip) = class.dns_service_ip.as_deref() {
        errors.extend(format::ipv4_address(ip, &root.child("dnsServiceIP")));
    }

    if class.network_policy == Some(NetworkPolicy::Azure)
        && class.network_plugin == Some(NetworkPlugin::Kubenet)
    {
        errors.push(FieldError::conflict(
            &root.child("networkPolicy"),
            "network policy 'azure' requires network plugin 'azure'",
        ));
    }

    if let Some(aad) = &class.aad_profile {
        if aad.managed && aad.admin_group_object_ids.is_empty() {
            errors.push(FieldError::required(
                &root.child("aadProfile").child("adminGroupObjectIDs"),
                "at least one admin group object ID is required for managed AAD",
            ));
        }
    }

    if let Some(access) = &class.api_server_access_profile {
        let path = root.child("apiServerAccessProfile");
        let ranges = path.child("authorizedIPRanges");
        for (i, range) in access.authorized_ip_ranges.iter().enumerate() {
            errors.extend(format::cidr(range, &ranges.index(i)));
        }
        if access.is_private() && !access.authorized_ip_ranges.is_empty() {
            errors.push(FieldError::conflict(
                &ranges,
                "authorized IP ranges are not allowed with a private cluster",
            ));
        }
        if !access.is_private() {
            if access.private_dns_zone.is_some() {
                errors.push(FieldError::conflict(
                    &path.child("privateDNSZone"),
                    "a private DNS zone requires a private cluster",
                ));
            }
            if access.enable_private_cluster_public_fqdn == Some(true) {
                errors.push(FieldError::conflict(
                    &path.child("enablePrivateClusterPublicFQDN"),
                    "a public FQDN requires a private cluster",
                ));
            }
        }
    }

    if let Some(lb) = &class.load_balancer_profile {
        let path = root.child("loadBalancerProfile");
        if class.load_balancer_sku == Some(LoadBalancerSku::Basic) {
            errors.push(FieldError::conflict(
                &path,
                "a load balancer profile requires load balancer SKU 'Standard'",
            ));
        }
        if let Err(count) = lb.outbound_ip_strategy() {
            errors.push(FieldError::conflict(
                &path,
                format!(
                    "only one of managedOutboundIPs, outboundIPPrefixes and outboundIPs may be set, found {}",
                    count
                ),
            ));
        }
        check_bounds(&mut errors, lb.managed_outbound_ips, 1, 100, &path.child("managedOutboundIPs"));
        check_bounds(&mut errors, lb.allocated_outbound_ports, 0, 64000, &path.child("allocatedOutboundPorts"));
        check_bounds(&mut errors, lb.idle_timeout_in_minutes, 4, 120, &path.child("idleTimeoutInMinutes"));
    }

    if let Some(vnet) = &class.virtual_network {
        let path = root.child("virtualNetwork");
        let vnet_cidr = vnet.cidr_block.as_deref().map(|c| (c, path.child("cidrBlock")));
        let subnet_cidr = vnet
            .subnet
            .as_ref()
            .and_then(|s| s.cidr_block.as_deref())
            .map(|c| (c, path.child("subnet").child("cidrBlock")));

        let mut parsed = Vec::new();
        for (cidr, cidr_path) in vnet_cidr.iter().chain(subnet_cidr.iter()) {
            match format::cidr(cidr, cidr_path) {
                Some(err) => errors.push(err),
                None => parsed.push(cidr.parse::<Cidr>().ok()),
            }
        }
        if let ([Some(outer), Some(inner)], Some((cidr, cidr_path))) = (parsed.as_slice(), &subnet_cidr) {
            if !outer.contains(inner) {
                errors.push(FieldError::invalid(
                    cidr_path,
                    cidr,
                    "subnet CIDR must lie within the virtual network CIDR",
                ));
            }
        }
    }

    if let Some(profile) = &class.autoscaler_profile {
        let path = root.child("autoscalerProfile");
        for (name, kind, value) in profile.knobs() {
            if let Some(value) = value {
                errors.extend(validate_knob(kind, value, &path.child(name)));
            }
        }
    }

    errors
}

/// Update rules on the class fields. `old_value` and `new_value` are the
/// serialized objects the class fields live in, rooted at `root`.
pub fn validate_class_update(
    old: &AzureManagedControlPlaneClassSpec,
    new: &AzureManagedControlPlaneClassSpec,
    old_value: &serde_json::Value,
    new_value: &serde_json::Value,
    root: &FieldPath,
) -> ValidationResult {
    let mut errors = validate_class(new, root);
    let mut warnings = Vec::new();

    errors.extend(immutability::check(old_value, new_value, root, CLASS_RULES));

    let (error, warning) = validate_version_change(&old.version, &new.version, &root.child("version"));
    errors.extend(error);
    warnings.extend(warning);

    let was_private = old
        .api_server_access_profile
        .as_ref()
        .is_some_and(|p| p.is_private());
    let is_private = new
        .api_server_access_profile
        .as_ref()
        .is_some_and(|p| p.is_private());
    if was_private != is_private {
        errors.push(FieldError::forbidden(
            &root.child("apiServerAccessProfile").child("enablePrivateCluster"),
            "field is immutable",
        ));
    }

    if let Some(old_aad) = &old.aad_profile {
        let path = root.child("aadProfile");
        match &new.aad_profile {
            None if old_aad.managed => {
                errors.push(FieldError::forbidden(
                    &path,
                    "managed AAD cannot be disabled once enabled",
                ));
            }
            None => {}
            Some(new_aad) => {
                if old_aad.managed && !new_aad.managed {
                    errors.push(FieldError::unsupported(
                        &path.child("managed"),
                        Some("false".to_string()),
                        "managed AAD cannot be disabled once enabled",
                    ));
                }
                if !old_aad.admin_group_object_ids.is_empty()
                    && new_aad.admin_group_object_ids.is_empty()
                {
                    errors.push(FieldError::forbidden(
                        &path.child("adminGroupObjectIDs"),
                        "admin group object IDs cannot be removed",
                    ));
                }
            }
        }
    }

    ValidationResult::new(errors, warnings)
}

fn validate_endpoint_unset(cp: &AzureManagedControlPlane, errors: &mut ErrorList) {
    let path = FieldPath::new("spec").child("controlPlaneEndpoint");
    let endpoint = &cp.spec.control_plane_endpoint;
    if !endpoint.host.is_empty() {
        errors.push(FieldError::invalid(
            &path.child("host"),
            &endpoint.host,
            "field is set by the controller and must be empty at creation",
        ));
    }
    if endpoint.port != 0 {
        errors.push(FieldError::invalid(
            &path.child("port"),
            endpoint.port,
            "field is set by the controller and must be zero at creation",
        ));
    }
}

impl AdmissionPolicy for AzureManagedControlPlane {
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()> {
        let name = object_name(&self.metadata).to_string();
        default_class(&mut self.spec.class, Some(&name), ctx);

        let spec = &mut self.spec;
        if spec.node_resource_group_name.is_empty() {
            spec.node_resource_group_name = format!(
                "MC_{}_{}_{}",
                spec.resource_group_name, name, spec.class.location
            );
        }
        if let Some(vnet) = spec.class.virtual_network.as_mut() {
            fill(&mut vnet.resource_group, &spec.resource_group_name);
        }

        if spec.ssh_public_key.is_empty() && ctx.generates() {
            debug!(name = %name, "Generating SSH public key for control plane");
            spec.ssh_public_key = keygen::generate_ssh_public_key()?;
        }
        Ok(())
    }

    fn validate_create(&self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let spec_path = FieldPath::new("spec");
        let mut errors = ErrorList::new();

        errors.extend(ctx.require_gate(Feature::MachinePool, &spec_path));
        errors.extend(validate_object_name(&self.metadata));
        errors.extend(validate_class(&self.spec.class, &spec_path));

        if !self.spec.ssh_public_key.is_empty() {
            errors.extend(format::ssh_public_key(
                &self.spec.ssh_public_key,
                &spec_path.child("sshPublicKey"),
            ));
        }
        validate_endpoint_unset(self, &mut errors);

        ValidationResult::from(errors)
    }

    fn validate_update(&self, old: &Self, ctx: &AdmissionContext<'_>) -> ValidationResult {
        let spec_path = FieldPath::new("spec");

        if let Err(err) = ctx.request() {
            return ValidationResult::from(err);
        }

        let (old, new) = match (normalized(old), normalized(self)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };
        let (old_value, new_value) = match (
            serialized(&old.spec, &spec_path),
            serialized(&new.spec, &spec_path),
        ) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };

        let class = validate_class_update(
            &old.spec.class,
            &new.spec.class,
            &old_value,
            &new_value,
            &spec_path,
        );
        let mut errors = class.errors;
        errors.extend(immutability::check(&old_value, &new_value, &spec_path, INSTANCE_RULES));

        let ssh_path = spec_path.child("sshPublicKey");
        if old.spec.ssh_public_key != new.spec.ssh_public_key {
            let detail = if new.spec.ssh_public_key.is_empty() {
                "removing SSH key is not allowed"
            } else {
                "field is immutable"
            };
            errors.push(FieldError::forbidden(&ssh_path, detail));
        } else if !new.spec.ssh_public_key.is_empty() {
            errors.extend(format::ssh_public_key(&new.spec.ssh_public_key, &ssh_path));
        }

        ValidationResult::new(errors, class.warnings)
    }
}
