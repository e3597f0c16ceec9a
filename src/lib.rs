//! azure-managed-admission library crate
//!
//! Defaulting and validation for the Cluster API Azure managed-cluster
//! resources, exposed as Kubernetes admission webhooks.

pub mod config;
pub mod crd;
pub mod error;
pub mod health;
pub mod validation;
pub mod webhooks;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use health::HealthState;
pub use webhooks::{AdmissionDispatcher, run_webhook_server};
