//! azure-managed-admission - admission webhooks for managed Azure clusters.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use azure_managed_admission::health::{HealthState, run_health_server};
use azure_managed_admission::{AdmissionDispatcher, WebhookConfig, run_webhook_server};

/// Grace period for in-flight admission reviews during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("azure_managed_admission=info".parse()?),
        )
        .json()
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = WebhookConfig::from_env()?;
    info!(
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        gates = ?config.feature_gates,
        subscription_default = config.subscription_id.is_some(),
        "Starting azure-managed-admission"
    );

    let health_state = Arc::new(HealthState::new());
    let dispatcher = AdmissionDispatcher::new(
        Arc::new(config.feature_gates.clone()),
        config.subscription_id.clone(),
    );

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let health_state = health_state.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(&config, dispatcher, health_state).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("Admission server stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
