//! AzureManagedControlPlaneTemplate Custom Resource Definition.
//!
//! A ClusterClass template carrying only the class-level control plane
//! fields. Instance fields (resource groups, SSH key, endpoint) are chosen
//! per cluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::control_plane::AzureManagedControlPlaneClassSpec;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedControlPlaneTemplate",
    plural = "azuremanagedcontrolplanetemplates",
    shortname = "amcpt",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneTemplateSpec {
    pub template: AzureManagedControlPlaneTemplateResource,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AzureManagedControlPlaneTemplateResource {
    pub spec: AzureManagedControlPlaneClassSpec,
}
