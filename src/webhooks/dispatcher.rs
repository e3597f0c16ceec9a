//! Routes admission requests to the policy for their kind.
//!
//! Reviews arrive as [`DynamicObject`]s; the dispatcher picks the typed
//! resource from `request.kind.kind`, deserializes, and runs the matching
//! [`AdmissionPolicy`] entry point. The mutating path answers with an
//! RFC 6902 patch, the validating path with an allow/deny decision plus
//! warnings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::crd::{
    AzureClusterIdentity, AzureMachine, AzureMachineTemplate, AzureManagedCluster,
    AzureManagedControlPlane, AzureManagedControlPlaneTemplate, AzureManagedMachinePool,
};
use crate::error::{Error, Result};
use crate::webhooks::context::{AdmissionContext, FeatureGates, RequestInfo};
use crate::webhooks::policies::{AdmissionPolicy, DefaultingContext, ValidationResult};

/// The resource kinds this service admits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cluster,
    ControlPlane,
    ControlPlaneTemplate,
    MachinePool,
    Machine,
    MachineTemplate,
    ClusterIdentity,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Cluster,
        ResourceKind::ControlPlane,
        ResourceKind::ControlPlaneTemplate,
        ResourceKind::MachinePool,
        ResourceKind::Machine,
        ResourceKind::MachineTemplate,
        ResourceKind::ClusterIdentity,
    ];

    /// The Kubernetes `kind` string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "AzureManagedCluster",
            ResourceKind::ControlPlane => "AzureManagedControlPlane",
            ResourceKind::ControlPlaneTemplate => "AzureManagedControlPlaneTemplate",
            ResourceKind::MachinePool => "AzureManagedMachinePool",
            ResourceKind::Machine => "AzureMachine",
            ResourceKind::MachineTemplate => "AzureMachineTemplate",
            ResourceKind::ClusterIdentity => "AzureClusterIdentity",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Lower-case operation name for logs and metric labels.
pub fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
        Operation::Connect => "connect",
    }
}

/// Stateless apart from configuration; safe to share across requests.
#[derive(Clone)]
pub struct AdmissionDispatcher {
    gates: Arc<dyn FeatureGates>,
    subscription_id: Option<String>,
}

impl AdmissionDispatcher {
    pub fn new(gates: Arc<dyn FeatureGates>, subscription_id: Option<String>) -> Self {
        Self {
            gates,
            subscription_id,
        }
    }

    /// Defaulting entry point.
    pub fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let result = request.kind.kind.parse().and_then(|kind| match kind {
            ResourceKind::Cluster => self.mutate_as::<AzureManagedCluster>(request),
            ResourceKind::ControlPlane => self.mutate_as::<AzureManagedControlPlane>(request),
            ResourceKind::ControlPlaneTemplate => {
                self.mutate_as::<AzureManagedControlPlaneTemplate>(request)
            }
            ResourceKind::MachinePool => self.mutate_as::<AzureManagedMachinePool>(request),
            ResourceKind::Machine => self.mutate_as::<AzureMachine>(request),
            ResourceKind::MachineTemplate => self.mutate_as::<AzureMachineTemplate>(request),
            ResourceKind::ClusterIdentity => self.mutate_as::<AzureClusterIdentity>(request),
        });
        result.unwrap_or_else(|err| error_response(request, &err))
    }

    /// Validation entry point.
    pub fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let info = RequestInfo {
            uid: request.uid.clone(),
            operation: request.operation.clone(),
            dry_run: request.dry_run,
            user: request.user_info.username.clone(),
        };
        let result = request.kind.kind.parse().and_then(|kind| match kind {
            ResourceKind::Cluster => self.validate_as::<AzureManagedCluster>(request, &info),
            ResourceKind::ControlPlane => {
                self.validate_as::<AzureManagedControlPlane>(request, &info)
            }
            ResourceKind::ControlPlaneTemplate => {
                self.validate_as::<AzureManagedControlPlaneTemplate>(request, &info)
            }
            ResourceKind::MachinePool => self.validate_as::<AzureManagedMachinePool>(request, &info),
            ResourceKind::Machine => self.validate_as::<AzureMachine>(request, &info),
            ResourceKind::MachineTemplate => self.validate_as::<AzureMachineTemplate>(request, &info),
            ResourceKind::ClusterIdentity => self.validate_as::<AzureClusterIdentity>(request, &info),
        });

        match result {
            Ok(outcome) => into_response(request, outcome),
            Err(err) => error_response(request, &err),
        }
    }

    fn mutate_as<T: AdmissionPolicy>(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<AdmissionResponse> {
        if !matches!(request.operation, Operation::Create | Operation::Update) {
            return Ok(AdmissionResponse::from(request));
        }

        let original: T = decode(request.object.as_ref(), "object")?;
        let mut defaulted = original.clone();
        defaulted.apply_defaults(&DefaultingContext::admission(self.subscription_id.as_deref()))?;

        let patch = json_patch::diff(
            &serde_json::to_value(&original)?,
            &serde_json::to_value(&defaulted)?,
        );
        debug!(
            uid = %request.uid,
            kind = %request.kind.kind,
            operations = patch.0.len(),
            "Computed defaulting patch"
        );
        if patch.0.is_empty() {
            return Ok(AdmissionResponse::from(request));
        }
        AdmissionResponse::from(request)
            .with_patch(patch)
            .map_err(|e| Error::Patch(e.to_string()))
    }

    fn validate_as<T: AdmissionPolicy>(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        info: &RequestInfo,
    ) -> Result<ValidationResult> {
        let ctx = AdmissionContext::new(self.gates.as_ref(), Some(info));
        let outcome = match request.operation {
            Operation::Create => {
                let obj: T = decode(request.object.as_ref(), "object")?;
                obj.validate_create(&ctx)
            }
            Operation::Update => {
                let obj: T = decode(request.object.as_ref(), "object")?;
                let old: T = decode(request.old_object.as_ref(), "oldObject")?;
                obj.validate_update(&old, &ctx)
            }
            Operation::Delete => {
                let old: T = decode(request.old_object.as_ref(), "oldObject")?;
                old.validate_delete(&ctx)
            }
            Operation::Connect => ValidationResult::allowed(),
        };
        Ok(outcome)
    }
}

/// Convert an untyped object into `T` through its JSON form.
fn decode<T: DeserializeOwned>(obj: Option<&DynamicObject>, field: &'static str) -> Result<T> {
    let obj = obj.ok_or(Error::MissingObject(field))?;
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

fn into_response(request: &AdmissionRequest<DynamicObject>, outcome: ValidationResult) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    if !outcome.is_allowed() {
        let message = format!(
            "{} {:?} is invalid: {}",
            request.kind.kind, request.name, outcome.errors
        );
        warn!(
            uid = %request.uid,
            kind = %request.kind.kind,
            errors = outcome.errors.len(),
            message = %message,
            "Admission request denied"
        );
        response = response.deny(message);
    }
    if !outcome.warnings.is_empty() {
        response.warnings = Some(outcome.warnings);
    }
    response
}

fn error_response(request: &AdmissionRequest<DynamicObject>, err: &Error) -> AdmissionResponse {
    if err.is_client_error() {
        warn!(uid = %request.uid, kind = %request.kind.kind, error = %err, "Rejecting malformed admission request");
    } else {
        tracing::error!(uid = %request.uid, kind = %request.kind.kind, error = %err, "Admission request failed");
    }
    AdmissionResponse::from(request).deny(format!("internal error: {}", err))
}
