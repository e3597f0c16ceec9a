//! Custom Resource Definitions for the managed Azure cluster resources.
//!
//! - `AzureManagedCluster`: the infrastructure cluster object
//! - `AzureManagedControlPlane` / `AzureManagedControlPlaneTemplate`: the AKS control plane
//! - `AzureManagedMachinePool`: an AKS agent pool
//! - `AzureMachine` / `AzureMachineTemplate`: self-managed VMs
//! - `AzureClusterIdentity`: credentials used to reach Azure

mod cluster;
mod cluster_identity;
mod common;
mod control_plane;
mod control_plane_template;
mod machine;
mod machine_pool;
mod machine_template;

pub use cluster::*;
pub use cluster_identity::*;
pub use common::*;
pub use control_plane::*;
pub use control_plane_template::*;
pub use machine::*;
pub use machine_pool::*;
pub use machine_template::*;
