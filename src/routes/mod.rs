use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod certificates;
pub mod health;
pub mod issuance;
pub mod metrics;
pub mod verify;
pub mod webhook;

/// Application routes, without the metrics endpoint or middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/certificates/issue", post(issuance::request_issuance))
        .route("/api/v1/issuance/jobs/{job_id}", get(issuance::get_job_status))
        .route("/api/v1/verify", post(verify::verify_credential))
        .route("/api/v1/certificates/batch/{batch_id}", get(certificates::get_batch_certificate))
        .route("/api/v1/certificates/{id}", get(certificates::get_certificate))
        .route("/api/v1/certificates/{id}/revoke", post(certificates::revoke_certificate))
        .route("/api/v1/certificates/{id}/revocations", get(certificates::list_revocations))
        .route("/api/v1/certificates/{id}/share", post(certificates::share_certificate))
        .route("/api/v1/webhooks/provider", post(webhook::provider_webhook))
        .with_state(state)
}
