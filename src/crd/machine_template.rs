//! AzureMachineTemplate Custom Resource Definition.
//!
//! Machine sets stamp [`AzureMachine`](super::AzureMachine)s out of a
//! template, so a template's spec is frozen once created.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::machine::AzureMachineSpec;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachineTemplate",
    plural = "azuremachinetemplates",
    shortname = "amt",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineTemplateSpec {
    pub template: AzureMachineTemplateResource,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AzureMachineTemplateResource {
    pub spec: AzureMachineSpec,
}
