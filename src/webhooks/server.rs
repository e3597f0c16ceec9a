//! Admission webhook server.
//!
//! Serves `/mutate` (defaulting) and `/validate` over TLS. Register them with
//! a MutatingWebhookConfiguration and a ValidatingWebhookConfiguration
//! respectively; the certificate is usually issued by cert-manager and
//! mounted at [`WEBHOOK_CERT_PATH`](crate::config::WEBHOOK_CERT_PATH).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use tracing::{debug, error, info};

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::webhooks::dispatcher::{AdmissionDispatcher, operation_name};

/// Shared state for webhook handlers
pub struct WebhookState {
    pub dispatcher: AdmissionDispatcher,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(dispatcher: AdmissionDispatcher, health: Arc<HealthState>) -> Self {
        Self { dispatcher, health }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Mutate,
    Validate,
}

impl Endpoint {
    fn as_str(self) -> &'static str {
        match self {
            Endpoint::Mutate => "mutate",
            Endpoint::Validate => "validate",
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/validate", post(validate))
        .with_state(state)
}

async fn mutate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, review, Endpoint::Mutate)
}

async fn validate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, review, Endpoint::Validate)
}

fn handle(
    state: &WebhookState,
    review: AdmissionReview<DynamicObject>,
    endpoint: Endpoint,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let started = Instant::now();
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, endpoint = endpoint.as_str(), "Failed to extract admission request");
            state.health.metrics.record_invalid_review(endpoint.as_str());
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(Error::InvalidReview(e.to_string())).into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        kind = %request.kind.kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        dry_run = request.dry_run,
        endpoint = endpoint.as_str(),
        "Processing admission request"
    );

    let response = match endpoint {
        Endpoint::Mutate => state.dispatcher.mutate(&request),
        Endpoint::Validate => state.dispatcher.validate(&request),
    };

    state.health.metrics.record_admission(
        endpoint.as_str(),
        &request.kind.kind,
        operation_name(&request.operation),
        response.allowed,
        started.elapsed().as_secs_f64(),
    );
    if response.allowed {
        info!(
            uid = %request.uid,
            kind = %request.kind.kind,
            patched = response.patch.is_some(),
            warnings = response.warnings.as_ref().map_or(0, Vec::len),
            "Admission request allowed"
        );
    }

    (StatusCode::OK, Json(response.into_review()))
}

/// Run the webhook server with TLS until the listener fails.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    dispatcher: AdmissionDispatcher,
    health: Arc<HealthState>,
) -> Result<()> {
    let tls = RustlsConfig::from_pem_file(config.cert_path.clone(), config.key_path.clone())
        .await
        .map_err(|e| Error::Config(format!("loading TLS certificate: {}", e)))?;

    let state = Arc::new(WebhookState::new(dispatcher, health.clone()));
    let app = create_webhook_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
