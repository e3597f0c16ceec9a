// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for azure-managed-admission.
//!
//! Uses proptest to generate random resources and check the defaulter and
//! validator laws: idempotence, monotonicity, gate enforcement and
//! immutability closure.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;
use serde_json::{Value, json};

use azure_managed_admission::crd::{AzureManagedControlPlane, NodePoolMode};
use azure_managed_admission::validation::immutability::{is_zero, lookup};
use azure_managed_admission::validation::{FieldDiff, FieldPath, format};
use azure_managed_admission::webhooks::keygen::generate_ssh_public_key;
use azure_managed_admission::webhooks::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, FeatureGateSet, Operation, RequestInfo,
};

use common::fixtures::{ControlPlaneBuilder, SSH_PUBLIC_KEY, machine, machine_pool};

/// Strategy for versions with and without the `v` prefix.
fn any_version() -> impl Strategy<Value = String> {
    (0u32..3, 0u32..40, 0u32..20, any::<bool>()).prop_map(|(major, minor, patch, prefixed)| {
        let prefix = if prefixed { "v" } else { "" };
        format!("{}{}.{}.{}", prefix, major, minor, patch)
    })
}

/// Strategy for a sparse autoscaler profile: each knob either absent or set
/// to a valid value.
fn any_autoscaler() -> impl Strategy<Value = Option<Value>> {
    let knobs = (
        proptest::option::of(prop_oneof![Just("random"), Just("least-waste"), Just("priority")]),
        proptest::option::of(prop_oneof![Just("5s"), Just("30s"), Just("1m")]),
        proptest::option::of(prop_oneof![Just("true"), Just("false")]),
        proptest::option::of(prop_oneof![Just("0.3"), Just("0.75")]),
    )
        .prop_map(|(expander, scan, balance, threshold)| {
            let mut profile = serde_json::Map::new();
            let mut put = |key: &str, value: Option<&str>| {
                if let Some(value) = value {
                    profile.insert(key.to_string(), json!(value));
                }
            };
            put("expander", expander);
            put("scanInterval", scan);
            put("balanceSimilarNodeGroups", balance);
            put("scaleDownUtilizationThreshold", threshold);
            Value::Object(profile)
        });
    proptest::option::of(knobs)
}

/// Strategy for control planes with a mix of set and unset fields.
fn any_control_plane() -> impl Strategy<Value = AzureManagedControlPlane> {
    (
        "[a-z][a-z0-9]{0,10}",
        any_version(),
        proptest::option::of(prop_oneof![Just("azure"), Just("kubenet")]),
        proptest::option::of(prop_oneof![Just("Basic"), Just("Standard")]),
        proptest::option::of("MC_[a-z]{1,8}"),
        any_autoscaler(),
    )
        .prop_map(|(name, version, plugin, sku, node_rg, autoscaler)| {
            let mut builder = ControlPlaneBuilder::new(name).version(&version);
            if let Some(profile) = autoscaler {
                builder = builder.autoscaler(profile);
            }
            let mut cp = builder.build();
            cp.spec.class.network_plugin = plugin.and_then(|p| serde_json::from_value(json!(p)).ok());
            cp.spec.class.load_balancer_sku = sku.and_then(|s| serde_json::from_value(json!(s)).ok());
            if let Some(node_rg) = node_rg {
                cp.spec.node_resource_group_name = node_rg;
            }
            cp
        })
}

fn admission() -> DefaultingContext<'static> {
    DefaultingContext::admission(Some("00000000-0000-0000-0000-000000000000"))
}

fn update_request() -> RequestInfo {
    RequestInfo {
        uid: "uid".to_string(),
        operation: Operation::Update,
        dry_run: false,
        user: None,
    }
}

proptest! {
    /// Property: defaulting twice equals defaulting once.
    #[test]
    fn test_defaulter_idempotent(cp in any_control_plane()) {
        let mut once = cp.clone();
        once.apply_defaults(&admission()).unwrap();
        let mut twice = once.clone();
        twice.apply_defaults(&admission()).unwrap();
        prop_assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    /// Property: defaulting only fills zero fields (version prefixing aside).
    #[test]
    fn test_defaulter_monotonic(cp in any_control_plane()) {
        let before = serde_json::to_value(&cp.spec).unwrap();
        let mut defaulted = cp.clone();
        defaulted.apply_defaults(&admission()).unwrap();
        let after = serde_json::to_value(&defaulted.spec).unwrap();

        let diff = FieldDiff::from_values(&before, &after, &FieldPath::new("spec"));
        for path in diff.without(&["spec.version"]) {
            let relative = path.trim_start_matches("spec.");
            prop_assert!(
                is_zero(lookup(&before, relative)),
                "default overwrote {} ({:?})",
                path,
                lookup(&before, relative)
            );
        }
    }

    /// Property: gated kinds cannot be created with their gate off.
    #[test]
    fn test_create_without_gate(cp in any_control_plane(), system in any::<bool>()) {
        let gates = FeatureGateSet::default();
        let ctx = AdmissionContext::new(&gates, None);
        prop_assert!(!cp.validate_create(&ctx).is_allowed());

        let mode = if system { NodePoolMode::System } else { NodePoolMode::User };
        let pool = machine_pool(cp.metadata.name.as_deref().unwrap_or("pool"), mode);
        prop_assert!(!pool.validate_create(&ctx).is_allowed());
    }

    /// Property: changing an immutable machine field is always reported at
    /// that field.
    #[test]
    fn test_machine_immutability_closure(
        sizes in ("Standard_[A-Z][0-9]{1,2}", "Standard_[A-Z][0-9]{1,2}"),
        domains in (proptest::option::of("[1-3]"), proptest::option::of("[1-3]")),
    ) {
        let (old_size, new_size) = sizes;
        let (old_domain, new_domain) = domains;
        prop_assume!(old_size != new_size || old_domain != new_domain);

        let mut old = machine("vm");
        old.spec.vm_size = old_size.clone();
        old.spec.failure_domain = old_domain.clone();
        let mut new = old.clone();
        new.spec.vm_size = new_size.clone();
        new.spec.failure_domain = new_domain.clone();

        let gates = FeatureGateSet::default();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        prop_assert_eq!(result.errors.has_path("spec.vmSize"), old_size != new_size);
        prop_assert_eq!(result.errors.has_path("spec.failureDomain"), old_domain != new_domain);
    }

    /// Property: a set control plane location can never be changed.
    #[test]
    fn test_control_plane_location_closure(location in "[a-z]{3,12}") {
        let mut old = ControlPlaneBuilder::new("cluster").build();
        old.spec.node_resource_group_name = "MC_fixed".to_string();
        let mut new = old.clone();
        prop_assume!(location != old.spec.class.location);
        new.spec.class.location = location;

        let gates = FeatureGateSet::all_enabled();
        let request = update_request();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, Some(&request)));
        prop_assert!(result.errors.has_path("spec.location"));
    }

    /// Property: any other SSH key than the stored one is rejected.
    #[test]
    fn test_ssh_key_closure(replacement in "[a-z]{0,8}") {
        let old = machine("vm");
        let mut new = old.clone();
        new.spec.ssh_public_key = replacement;
        prop_assume!(new.spec.ssh_public_key != SSH_PUBLIC_KEY);

        let gates = FeatureGateSet::default();
        let result = new.validate_update(&old, &AdmissionContext::new(&gates, None));
        prop_assert!(result.errors.has_path("spec.sshPublicKey"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(3))]

    /// Property: generated keys satisfy the SSH key validator.
    #[test]
    fn test_generated_keys_validate(_round in 0u8..3) {
        let key = generate_ssh_public_key().unwrap();
        prop_assert!(format::ssh_public_key(&key, &FieldPath::new("key")).is_none());
    }
}
