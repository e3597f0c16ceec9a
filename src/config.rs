//! Process configuration, read from the environment at startup.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::webhooks::context::FeatureGateSet;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health and metrics port
pub const HEALTH_PORT: u16 = 8080;

#[derive(Clone, Debug, PartialEq)]
pub struct WebhookConfig {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub feature_gates: FeatureGateSet,
    /// Written into clusters that leave `subscriptionID` empty.
    pub subscription_id: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            feature_gates: FeatureGateSet::default(),
            subscription_id: None,
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Unset and empty
    /// variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("WEBHOOK_PORT") {
            config.webhook_port = parse_port("WEBHOOK_PORT", &port)?;
        }
        if let Some(port) = get("HEALTH_PORT") {
            config.health_port = parse_port("HEALTH_PORT", &port)?;
        }
        if let Some(path) = get("WEBHOOK_CERT_PATH") {
            config.cert_path = PathBuf::from(path);
        }
        if let Some(path) = get("WEBHOOK_KEY_PATH") {
            config.key_path = PathBuf::from(path);
        }
        if let Some(gates) = get("FEATURE_GATES") {
            config.feature_gates = FeatureGateSet::parse(&gates)?;
        }
        config.subscription_id = get("AZURE_SUBSCRIPTION_ID");

        Ok(config)
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a port number, got {:?}", name, value)))
}
