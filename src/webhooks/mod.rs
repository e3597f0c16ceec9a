//! Admission webhooks for the managed Azure resources.
//!
//! - [`dispatcher`] routes a review to the policy for its kind
//! - [`policies`] holds one defaulter/validator per resource
//! - [`context`] carries the feature-gate and request oracles policies consult

pub mod context;
pub mod dispatcher;
pub mod keygen;
pub mod policies;
mod server;

pub use context::{AdmissionContext, Feature, FeatureGateSet, FeatureGates, RequestInfo};
pub use dispatcher::{AdmissionDispatcher, ResourceKind};
pub use policies::{AdmissionPolicy, DefaultingContext, DefaultingMode, ValidationResult};
pub use server::{WebhookState, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
