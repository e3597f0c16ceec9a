//! AzureMachine Custom Resource Definition.
//!
//! A single VM. [`AzureMachineSpec`] is also the payload of
//! [`AzureMachineTemplate`](super::AzureMachineTemplate).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, FutureState, Tags};

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachine",
    plural = "azuremachines",
    shortname = "amach",
    status = "AzureMachineStatus",
    namespaced,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.vmState"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineSpec {
    /// Output only.
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub vm_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,

    /// Absent means the provider's default image for the Kubernetes version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    #[serde(default, skip_serializing_if = "VmIdentity::is_none")]
    pub identity: VmIdentity,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_assigned_identities: Vec<UserAssignedIdentity>,

    /// Name of the role assignment created for the system-assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_assignment_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_assigned_identity_role: Option<SystemAssignedIdentityRole>,

    #[serde(default)]
    pub os_disk: OsDisk,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    /// Required on machines; a throwaway key is generated when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,

    #[serde(
        default,
        rename = "allocatePublicIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub allocate_public_ip: Option<bool>,

    #[serde(
        default,
        rename = "enableIPForwarding",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_ip_forwarding: Option<bool>,

    /// Deprecated in favour of `networkInterfaces`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated_networking: Option<bool>,

    /// Deprecated in favour of `networkInterfaces`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,
}

/// VM image. Exactly one of the three sources may be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_gallery: Option<SharedGalleryImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<MarketplaceImage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedGalleryImage {
    #[serde(default, rename = "subscriptionID")]
    pub subscription_id: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gallery: String,
    #[serde(default)]
    pub version: String,
}

impl SharedGalleryImage {
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("subscriptionID", self.subscription_id.as_str()),
            ("resourceGroup", self.resource_group.as_str()),
            ("name", self.name.as_str()),
            ("gallery", self.gallery.as_str()),
            ("version", self.version.as_str()),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceImage {
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub offer: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub third_party_image: bool,
}

impl MarketplaceImage {
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("publisher", self.publisher.as_str()),
            ("offer", self.offer.as_str()),
            ("sku", self.sku.as_str()),
            ("version", self.version.as_str()),
        ]
    }
}

/// The image source an [`Image`] resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageVariant<'a> {
    ById(&'a str),
    SharedGallery(&'a SharedGalleryImage),
    Marketplace(&'a MarketplaceImage),
}

impl Image {
    /// Resolve the union. `Err` carries the number of sources set when it is
    /// not exactly one.
    pub fn variant(&self) -> Result<ImageVariant<'_>, usize> {
        let mut set = Vec::new();
        if let Some(id) = self.id.as_deref() {
            set.push(ImageVariant::ById(id));
        }
        if let Some(gallery) = &self.shared_gallery {
            set.push(ImageVariant::SharedGallery(gallery));
        }
        if let Some(marketplace) = &self.marketplace {
            set.push(ImageVariant::Marketplace(marketplace));
        }
        match set.as_slice() {
            [only] => Ok(*only),
            other => Err(other.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum VmIdentity {
    #[default]
    None,
    SystemAssigned,
    UserAssigned,
}

impl VmIdentity {
    pub fn is_none(&self) -> bool {
        matches!(self, VmIdentity::None)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct UserAssignedIdentity {
    #[serde(default, rename = "providerID")]
    pub provider_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemAssignedIdentityRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(
        default,
        rename = "definitionID",
        skip_serializing_if = "Option::is_none"
    )]
    pub definition_id: Option<String>,
}

pub const CACHING_TYPES: &[&str] = &["None", "ReadOnly", "ReadWrite"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    /// `Linux` or `Windows`.
    #[serde(default)]
    pub os_type: String,
    #[serde(
        default,
        rename = "diskSizeGB",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_size_gb: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_disk: Option<ManagedDiskParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_disk_settings: Option<DiffDiskSettings>,
    /// One of [`CACHING_TYPES`], or empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caching_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDiskParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_type: Option<String>,
}

/// Ephemeral OS disk placement. Only `Local` exists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct DiffDiskSettings {
    pub option: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    #[serde(default)]
    pub name_suffix: String,
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_disk: Option<ManagedDiskParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caching_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default)]
    pub subnet_name: String,
    /// At least one.
    #[serde(default, rename = "privateIPConfigs")]
    pub private_ip_configs: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated_networking: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_operation_states: Vec<FutureState>,
}
