//! Unit tests for azure-managed-admission.
//!
//! These tests run without a Kubernetes cluster and drive the policies and
//! the dispatcher through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

#[path = "../common/mod.rs"]
mod common;

mod control_plane_scenarios {
    use azure_managed_admission::crd::{LoadBalancerProfile, NetworkPlugin, LoadBalancerSku, SkuTier};
    use azure_managed_admission::validation::{ErrorKind, FieldPath, format};
    use azure_managed_admission::webhooks::{
        AdmissionContext, AdmissionPolicy, DefaultingContext, FeatureGateSet,
    };
    use serde_json::json;

    use crate::common::fixtures::ControlPlaneBuilder;

    fn gates() -> FeatureGateSet {
        FeatureGateSet::all_enabled()
    }

    #[test]
    fn test_defaulting_from_bare_input() {
        let mut cp = ControlPlaneBuilder::new("fooName")
            .version("1.17.5")
            .ssh_public_key("")
            .build();
        cp.apply_defaults(&DefaultingContext::admission(None)).unwrap();

        let class = &cp.spec.class;
        assert_eq!(class.network_plugin, Some(NetworkPlugin::Azure));
        assert_eq!(class.load_balancer_sku, Some(LoadBalancerSku::Standard));
        assert_eq!(class.version, "v1.17.5");
        assert_eq!(class.sku.as_ref().map(|s| s.tier), Some(SkuTier::Free));
        assert_eq!(cp.spec.node_resource_group_name, "MC_fooRg_fooName_fooLocation");

        let vnet = class.virtual_network.as_ref().unwrap();
        assert_eq!(vnet.name.as_deref(), Some("fooName"));
        assert_eq!(vnet.subnet.as_ref().unwrap().name.as_deref(), Some("fooName"));

        assert!(!cp.spec.ssh_public_key.is_empty());
        assert!(format::ssh_public_key(&cp.spec.ssh_public_key, &FieldPath::new("key")).is_none());
    }

    #[test]
    fn test_invalid_dns_service_ip() {
        let cp = ControlPlaneBuilder::new("cluster")
            .version("v1.18.0")
            .dns_service_ip("192.168.0.0.3")
            .build();
        let gates = gates();
        let result = cp.validate_create(&AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        let err = result.errors.iter().next().unwrap();
        assert_eq!(err.path.as_str(), "spec.dnsServiceIP");
        assert_eq!(err.kind, ErrorKind::Invalid);
    }

    #[test]
    fn test_reserved_name() {
        let cp = ControlPlaneBuilder::new("microsoft-cluster").build();
        let gates = gates();
        let result = cp.validate_create(&AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors.has_path("metadata.name"));
    }

    #[test]
    fn test_endpoint_at_create() {
        let cp = ControlPlaneBuilder::new("cluster").endpoint("h", 0).build();
        let gates = gates();
        let result = cp.validate_create(&AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors.has_path("spec.controlPlaneEndpoint.host"));
    }

    #[test]
    fn test_load_balancer_mutual_exclusion() {
        let cp = ControlPlaneBuilder::new("cluster")
            .load_balancer_profile(&LoadBalancerProfile {
                managed_outbound_ips: Some(1),
                outbound_ips: vec!["/subscriptions/x/publicIPAddresses/ip".to_string()],
                ..Default::default()
            })
            .build();
        let gates = gates();
        let result = cp.validate_create(&AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors.has_path("spec.loadBalancerProfile"));
    }

    #[test]
    fn test_autoscaler_partial_fill() {
        let mut cp = ControlPlaneBuilder::new("cluster")
            .autoscaler(json!({"expander": "least-waste"}))
            .build();
        cp.apply_defaults(&DefaultingContext::admission(None)).unwrap();

        let profile = cp.spec.class.autoscaler_profile.as_ref().unwrap();
        assert!(profile.knobs().iter().all(|(_, _, value)| value.is_some()));
        assert_eq!(profile.expander.as_deref(), Some("least-waste"));

        let gates = gates();
        assert!(cp.validate_create(&AdmissionContext::new(&gates, None)).is_allowed());
    }

    #[test]
    fn test_create_without_gate() {
        let cp = ControlPlaneBuilder::new("cluster").build();
        let gates = FeatureGateSet::default();
        let result = cp.validate_create(&AdmissionContext::new(&gates, None));
        let err = result.errors.iter().next().unwrap();
        assert_eq!(err.kind, ErrorKind::NotSupported);
        assert_eq!(err.path.as_str(), "spec");
    }
}

mod boundary_tests {
    use azure_managed_admission::crd::{LoadBalancerProfile, NetworkInterface};
    use azure_managed_admission::webhooks::{AdmissionContext, AdmissionPolicy, FeatureGateSet};

    use crate::common::fixtures::{ControlPlaneBuilder, machine};

    fn lb_allowed(profile: LoadBalancerProfile) -> bool {
        let cp = ControlPlaneBuilder::new("cluster")
            .load_balancer_profile(&profile)
            .build();
        let gates = FeatureGateSet::all_enabled();
        cp.validate_create(&AdmissionContext::new(&gates, None)).is_allowed()
    }

    #[test]
    fn test_managed_outbound_ips() {
        let cases = [(0, false), (1, true), (100, true), (101, false)];
        for (value, allowed) in cases {
            let profile = LoadBalancerProfile {
                managed_outbound_ips: Some(value),
                ..Default::default()
            };
            assert_eq!(lb_allowed(profile), allowed, "managedOutboundIPs={}", value);
        }
    }

    #[test]
    fn test_allocated_outbound_ports() {
        let cases = [(-1, false), (0, true), (64000, true), (64001, false)];
        for (value, allowed) in cases {
            let profile = LoadBalancerProfile {
                allocated_outbound_ports: Some(value),
                ..Default::default()
            };
            assert_eq!(lb_allowed(profile), allowed, "allocatedOutboundPorts={}", value);
        }
    }

    #[test]
    fn test_idle_timeout() {
        let cases = [(3, false), (4, true), (120, true), (121, false)];
        for (value, allowed) in cases {
            let profile = LoadBalancerProfile {
                idle_timeout_in_minutes: Some(value),
                ..Default::default()
            };
            assert_eq!(lb_allowed(profile), allowed, "idleTimeoutInMinutes={}", value);
        }
    }

    #[test]
    fn test_private_ip_configs() {
        let cases = [(-1, false), (0, false), (1, true)];
        for (value, allowed) in cases {
            let mut m = machine("vm");
            m.spec.network_interfaces = vec![NetworkInterface {
                subnet_name: "subnet".to_string(),
                private_ip_configs: value,
                accelerated_networking: None,
            }];
            let gates = FeatureGateSet::default();
            let result = m.validate_create(&AdmissionContext::new(&gates, None));
            assert_eq!(result.is_allowed(), allowed, "privateIPConfigs={}", value);
        }
    }
}

mod machine_scenarios {
    use azure_managed_admission::crd::NetworkInterface;
    use azure_managed_admission::webhooks::{AdmissionContext, AdmissionPolicy, FeatureGateSet};

    use crate::common::fixtures::machine;

    #[test]
    fn test_network_interface_migration_allowed() {
        let mut old = machine("vm");
        old.spec.subnet_name = "subnet1".to_string();
        old.spec.accelerated_networking = Some(true);

        let mut new = old.clone();
        new.spec.subnet_name.clear();
        new.spec.accelerated_networking = None;
        new.spec.network_interfaces = vec![NetworkInterface {
            subnet_name: "subnet1".to_string(),
            private_ip_configs: 1,
            accelerated_networking: Some(true),
        }];

        let gates = FeatureGateSet::default();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        assert!(result.is_allowed(), "{}", result.errors);
    }

    #[test]
    fn test_network_interface_modification_rejected() {
        let mut old = machine("vm");
        old.spec.network_interfaces = vec![NetworkInterface {
            subnet_name: "subnet1".to_string(),
            private_ip_configs: 1,
            accelerated_networking: None,
        }];
        let mut new = old.clone();
        new.spec.network_interfaces[0].subnet_name = "subnet2".to_string();

        let gates = FeatureGateSet::default();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors.has_path("spec.networkInterfaces"));
    }

    #[test]
    fn test_default_mismatch_is_not_a_change() {
        let old = machine("vm");
        let mut new = old.clone();
        new.spec.os_disk.caching_type = "None".to_string();

        let gates = FeatureGateSet::default();
        assert!(new.validate_update(&old, &AdmissionContext::new(&gates, None)).is_allowed());
    }
}

mod dispatcher_tests {
    use std::sync::Arc;

    use azure_managed_admission::crd::{AzureMachine, NodePoolMode};
    use azure_managed_admission::webhooks::{AdmissionDispatcher, FeatureGateSet, Operation};
    use serde_json::Value;

    use crate::common::fixtures::{
        ControlPlaneBuilder, admission_request, cluster_identity, machine, machine_pool,
        machine_template,
    };

    fn dispatcher(gates: FeatureGateSet) -> AdmissionDispatcher {
        AdmissionDispatcher::new(Arc::new(gates), Some("sub-from-config".to_string()))
    }

    fn apply_patch<T: serde::Serialize>(obj: &T, patch: &[u8]) -> Value {
        let patch: json_patch::Patch = serde_json::from_slice(patch).unwrap();
        let mut value = serde_json::to_value(obj).unwrap();
        json_patch::patch(&mut value, &patch).unwrap();
        value
    }

    #[test]
    fn test_mutate_machine_fills_key_and_caching() {
        let mut m = machine("vm");
        m.spec.ssh_public_key.clear();
        let request = admission_request("AzureMachine", Operation::Create, Some(&m), None);

        let response = dispatcher(FeatureGateSet::default()).mutate(&request);
        assert!(response.allowed);
        let patched = apply_patch(&m, response.patch.as_deref().unwrap());

        let defaulted: AzureMachine = serde_json::from_value(patched).unwrap();
        assert!(defaulted.spec.ssh_public_key.starts_with("ssh-rsa "));
        assert_eq!(defaulted.spec.os_disk.caching_type, "None");
    }

    #[test]
    fn test_mutate_without_changes_has_no_patch() {
        let template = machine_template("tmpl");
        let mut defaulted = template.clone();
        defaulted.spec.template.spec.os_disk.caching_type = "None".to_string();
        let request =
            admission_request("AzureMachineTemplate", Operation::Create, Some(&defaulted), None);

        let response = dispatcher(FeatureGateSet::default()).mutate(&request);
        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_validate_denies_with_rendered_errors() {
        let cp = ControlPlaneBuilder::new("cluster").dns_service_ip("1.2.3.4.5").build();
        let request =
            admission_request("AzureManagedControlPlane", Operation::Create, Some(&cp), None);

        let response = dispatcher(FeatureGateSet::all_enabled()).validate(&request);
        assert!(!response.allowed);
        assert!(response.result.message.contains("AzureManagedControlPlane \"cluster\" is invalid"));
        assert!(response.result.message.contains("spec.dnsServiceIP"));
    }

    #[test]
    fn test_validate_update_returns_version_warning() {
        let old = ControlPlaneBuilder::new("cluster").version("v1.28.0").build();
        let new = ControlPlaneBuilder::new("cluster").version("v1.30.0").build();
        let request = admission_request(
            "AzureManagedControlPlane",
            Operation::Update,
            Some(&new),
            Some(&old),
        );

        let response = dispatcher(FeatureGateSet::all_enabled()).validate(&request);
        assert!(response.allowed, "{}", response.result.message);
        let warnings = response.warnings.unwrap_or_default();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("skips a minor"));
    }

    #[test]
    fn test_delete_system_pool_warns() {
        let pool = machine_pool("system", NodePoolMode::System);
        let request =
            admission_request("AzureManagedMachinePool", Operation::Delete, None, Some(&pool));

        let response = dispatcher(FeatureGateSet::all_enabled()).validate(&request);
        assert!(response.allowed);
        assert_eq!(response.warnings.map(|w| w.len()), Some(1));
    }

    #[test]
    fn test_identity_update_type_change() {
        let old = cluster_identity("identity");
        let mut new = old.clone();
        new.spec.identity_type = azure_managed_admission::crd::IdentityType::WorkloadIdentity;
        new.spec.client_secret = None;
        let request =
            admission_request("AzureClusterIdentity", Operation::Update, Some(&new), Some(&old));

        let response = dispatcher(FeatureGateSet::default()).validate(&request);
        assert!(!response.allowed);
        assert!(response.result.message.contains("spec.type"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let m = machine("vm");
        let request = admission_request("Pod", Operation::Create, Some(&m), None);
        let response = dispatcher(FeatureGateSet::default()).validate(&request);
        assert!(!response.allowed);
        assert!(response.result.message.contains("Unsupported kind"));
    }

    #[test]
    fn test_missing_object_rejected() {
        let request = admission_request::<AzureMachine>("AzureMachine", Operation::Create, None, None);
        let response = dispatcher(FeatureGateSet::default()).validate(&request);
        assert!(!response.allowed);
    }
}

mod config_tests {
    use azure_managed_admission::webhooks::{Feature, FeatureGateSet, FeatureGates};

    #[test]
    fn test_feature_gate_parsing() {
        let gates = FeatureGateSet::parse("MachinePool=true, AKS=false").unwrap();
        assert!(gates.enabled(Feature::MachinePool));
        assert!(!gates.enabled(Feature::Aks));
        assert!(FeatureGateSet::parse("Unknown=true").is_err());
        assert!(FeatureGateSet::parse("MachinePool=yes").is_err());
    }
}
