//! AzureManagedMachinePool Custom Resource Definition.
//!
//! An AKS agent pool. Most sizing fields are fixed at creation because the
//! underlying scale set cannot be reshaped in place.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, FutureState, OsType, Tags};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedMachinePool",
    plural = "azuremanagedmachinepools",
    shortname = "ammp",
    status = "AzureManagedMachinePoolStatus",
    namespaced,
    printcolumn = r#"{"name":"Mode", "type":"string", "jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedMachinePoolSpec {
    /// Agent pool name in AKS. Defaults to the object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<NodePoolMode>,

    /// VM size of the pool's nodes.
    #[serde(default)]
    pub sku: String,

    #[serde(
        default,
        rename = "osDiskSizeGB",
        skip_serializing_if = "Option::is_none"
    )]
    pub os_disk_size_gb: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ManagedMachinePoolScaling>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk_type: Option<OsDiskType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<OsType>,

    #[serde(
        default,
        rename = "enableUltraSSD",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_ultra_ssd: Option<bool>,

    #[serde(
        default,
        rename = "enableNodePublicIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_node_public_ip: Option<bool>,

    #[serde(
        default,
        rename = "nodePublicIPPrefixID",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_public_ip_prefix_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_set_priority: Option<ScaleSetPriority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_name: Option<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    /// Output only, the provider IDs of the pool's nodes.
    #[serde(default, rename = "providerIDList", skip_serializing_if = "Vec::is_empty")]
    pub provider_id_list: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum NodePoolMode {
    System,
    User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum OsDiskType {
    Managed,
    Ephemeral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ScaleSetPriority {
    Regular,
    Spot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum TaintEffect {
    NoSchedule,
    NoExecute,
    PreferNoSchedule,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub effect: TaintEffect,
}

/// Autoscaling bounds. Both ends are inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedMachinePoolScaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedMachinePoolStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_operation_states: Vec<FutureState>,
}
