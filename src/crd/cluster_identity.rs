//! AzureClusterIdentity Custom Resource Definition.
//!
//! Credentials a cluster uses to talk to Azure.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::Condition;

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterIdentity",
    plural = "azureclusteridentities",
    shortname = "aci",
    status = "AzureClusterIdentityStatus",
    namespaced,
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterIdentitySpec {
    #[serde(rename = "type")]
    pub identity_type: IdentityType,

    #[serde(default, rename = "clientID")]
    pub client_id: String,

    #[serde(default, rename = "tenantID")]
    pub tenant_id: String,

    /// Only for `UserAssignedMSI`.
    #[serde(default, rename = "resourceID", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretReference>,

    /// Namespaces whose clusters may use this identity. Absent means only
    /// the identity's own namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_namespaces: Option<AllowedNamespaces>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum IdentityType {
    ServicePrincipal,
    UserAssignedMSI,
    ManualServicePrincipal,
    ServicePrincipalCertificate,
    WorkloadIdentity,
}

impl IdentityType {
    /// Whether the identity authenticates with a secret the cluster must read.
    pub fn needs_secret(&self) -> bool {
        matches!(
            self,
            IdentityType::ServicePrincipal | IdentityType::ServicePrincipalCertificate
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SecretReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AllowedNamespaces {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AzureClusterIdentityStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
