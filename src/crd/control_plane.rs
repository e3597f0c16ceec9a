//! AzureManagedControlPlane Custom Resource Definition.
//!
//! The managed control plane of an AKS cluster. Fields shared with
//! [`AzureManagedControlPlaneTemplate`](super::AzureManagedControlPlaneTemplate)
//! live in [`AzureManagedControlPlaneClassSpec`] and are flattened into the
//! instance spec, so both serialize to the same JSON shape.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{ApiEndpoint, Condition, FutureState, Tags};

/// AzureManagedControlPlane describes an AKS control plane.
///
/// Example:
/// ```yaml
/// apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
/// kind: AzureManagedControlPlane
/// metadata:
///   name: my-cluster
/// spec:
///   version: v1.30.2
///   location: westeurope
///   resourceGroupName: my-rg
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedControlPlane",
    plural = "azuremanagedcontrolplanes",
    shortname = "amcp",
    status = "AzureManagedControlPlaneStatus",
    namespaced,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneSpec {
    #[serde(flatten)]
    pub class: AzureManagedControlPlaneClassSpec,

    /// Resource group the managed cluster lives in.
    pub resource_group_name: String,

    /// Resource group for the cluster's node resources.
    /// Defaults to `MC_<resourceGroupName>_<name>_<location>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_resource_group_name: String,

    /// OpenSSH authorized-keys entry installed on every node.
    /// A throwaway key is generated when empty; its private half is discarded.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,

    /// Output only, set by the reconciler.
    #[serde(default, skip_serializing_if = "ApiEndpoint::is_zero")]
    pub control_plane_endpoint: ApiEndpoint,
}

/// Control plane fields shared by the instance and the template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneClassSpec {
    /// Kubernetes version, `vMAJOR.MINOR.PATCH`. A missing `v` is added.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(
        default,
        rename = "subscriptionID",
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_id: Option<String>,

    /// Azure region.
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin: Option<NetworkPlugin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicy>,

    #[serde(
        default,
        rename = "loadBalancerSKU",
        skip_serializing_if = "Option::is_none"
    )]
    pub load_balancer_sku: Option<LoadBalancerSku>,

    /// Must fall within the service CIDR; only the format is checked here.
    #[serde(
        default,
        rename = "dnsServiceIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub dns_service_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network: Option<ManagedControlPlaneVirtualNetwork>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<AksSku>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_profile: Option<AadProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_access_profile: Option<ApiServerAccessProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_profile: Option<LoadBalancerProfile>,

    #[serde(
        default,
        rename = "autoscalerProfile",
        skip_serializing_if = "Option::is_none"
    )]
    pub autoscaler_profile: Option<AutoScalerProfile>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPlugin {
    Azure,
    Kubenet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    Azure,
    Calico,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LoadBalancerSku {
    Basic,
    Standard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SkuTier {
    Free,
    Paid,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AksSku {
    pub tier: SkuTier,
}

/// Virtual network the cluster nodes attach to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedControlPlaneVirtualNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    /// Defaults to the control plane's resource group when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<ManagedControlPlaneSubnet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedControlPlaneSubnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
}

/// Azure AD integration. Once `managed` is true it stays true.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AadProfile {
    pub managed: bool,
    #[serde(default, rename = "adminGroupObjectIDs")]
    pub admin_group_object_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerAccessProfile {
    #[serde(
        default,
        rename = "authorizedIPRanges",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authorized_ip_ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_private_cluster: Option<bool>,
    #[serde(
        default,
        rename = "privateDNSZone",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_dns_zone: Option<PrivateDnsZone>,
    #[serde(
        default,
        rename = "enablePrivateClusterPublicFQDN",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_private_cluster_public_fqdn: Option<bool>,
}

impl ApiServerAccessProfile {
    pub fn is_private(&self) -> bool {
        self.enable_private_cluster.unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum PrivateDnsZone {
    System,
    None,
}

/// Outbound configuration of the cluster load balancer.
///
/// The three outbound-IP fields form a discriminated union; see
/// [`LoadBalancerProfile::outbound_ip_strategy`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProfile {
    #[serde(
        default,
        rename = "managedOutboundIPs",
        skip_serializing_if = "Option::is_none"
    )]
    pub managed_outbound_ips: Option<i32>,
    #[serde(
        default,
        rename = "outboundIPPrefixes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub outbound_ip_prefixes: Vec<String>,
    #[serde(default, rename = "outboundIPs", skip_serializing_if = "Vec::is_empty")]
    pub outbound_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_outbound_ports: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_in_minutes: Option<i32>,
}

/// The single outbound-IP strategy a load balancer profile selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboundIpStrategy<'a> {
    Managed(i32),
    Prefixes(&'a [String]),
    Explicit(&'a [String]),
}

impl LoadBalancerProfile {
    /// Resolve the outbound-IP union. `Err` carries the number of strategies
    /// set when more than one is.
    pub fn outbound_ip_strategy(&self) -> Result<Option<OutboundIpStrategy<'_>>, usize> {
        let mut set = Vec::new();
        if let Some(count) = self.managed_outbound_ips {
            set.push(OutboundIpStrategy::Managed(count));
        }
        if !self.outbound_ip_prefixes.is_empty() {
            set.push(OutboundIpStrategy::Prefixes(&self.outbound_ip_prefixes));
        }
        if !self.outbound_ips.is_empty() {
            set.push(OutboundIpStrategy::Explicit(&self.outbound_ips));
        }
        match set.len() {
            0 => Ok(None),
            1 => Ok(set.pop()),
            n => Err(n),
        }
    }
}

/// Cluster autoscaler tuning. Every knob is a string; when the profile is
/// present, defaulting fills all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_similar_node_groups: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expander: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_empty_bulk_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_graceful_termination_sec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_node_provision_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_unready_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_pod_scale_up_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok_total_unready_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_add: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_unneeded_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_unready_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_utilization_threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nodes_with_local_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nodes_with_system_pods: Option<String>,
}

/// Format class of an autoscaler knob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnobKind {
    Bool,
    Expander,
    NonNegativeInteger,
    Percentage,
    Duration,
    Fraction,
}

pub const EXPANDERS: &[&str] = &["least-waste", "most-pods", "priority", "random"];

impl AutoScalerProfile {
    /// Every knob as `(json name, kind, value)`, in declaration order.
    pub fn knobs(&self) -> [(&'static str, KnobKind, Option<&str>); 17] {
        use KnobKind::*;
        [
            ("balanceSimilarNodeGroups", Bool, self.balance_similar_node_groups.as_deref()),
            ("expander", Expander, self.expander.as_deref()),
            ("maxEmptyBulkDelete", NonNegativeInteger, self.max_empty_bulk_delete.as_deref()),
            ("maxGracefulTerminationSec", NonNegativeInteger, self.max_graceful_termination_sec.as_deref()),
            ("maxNodeProvisionTime", Duration, self.max_node_provision_time.as_deref()),
            ("maxTotalUnreadyPercentage", Percentage, self.max_total_unready_percentage.as_deref()),
            ("newPodScaleUpDelay", Duration, self.new_pod_scale_up_delay.as_deref()),
            ("okTotalUnreadyCount", NonNegativeInteger, self.ok_total_unready_count.as_deref()),
            ("scanInterval", Duration, self.scan_interval.as_deref()),
            ("scaleDownDelayAfterAdd", Duration, self.scale_down_delay_after_add.as_deref()),
            ("scaleDownDelayAfterDelete", Duration, self.scale_down_delay_after_delete.as_deref()),
            ("scaleDownDelayAfterFailure", Duration, self.scale_down_delay_after_failure.as_deref()),
            ("scaleDownUnneededTime", Duration, self.scale_down_unneeded_time.as_deref()),
            ("scaleDownUnreadyTime", Duration, self.scale_down_unready_time.as_deref()),
            ("scaleDownUtilizationThreshold", Fraction, self.scale_down_utilization_threshold.as_deref()),
            ("skipNodesWithLocalStorage", Bool, self.skip_nodes_with_local_storage.as_deref()),
            ("skipNodesWithSystemPods", Bool, self.skip_nodes_with_system_pods.as_deref()),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_operation_states: Vec<FutureState>,
}
