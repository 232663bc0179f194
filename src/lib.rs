//! Quality credential lifecycle service.
//!
//! Issues verifiable quality credentials for inspected product batches
//! through a durable job queue, verifies presented credentials against the
//! trust provider and a local revocation ledger, and applies provider
//! webhooks to certificate state.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "credential_issuance_total",
        "Issuance jobs by outcome (enqueued, success, failed)"
    );
    metrics::describe_histogram!(
        "credential_issuance_seconds",
        "Time from job claim to certificate persisted"
    );
    metrics::describe_counter!(
        "credential_verifications_total",
        "Verification verdicts by outcome and path"
    );
    metrics::describe_counter!(
        "credential_revocations_total",
        "Certificates revoked, by source (admin, webhook)"
    );
    metrics::describe_counter!(
        "provider_webhooks_total",
        "Provider webhook deliveries by status"
    );
    metrics::describe_histogram!(
        "provider_request_seconds",
        "Latency of trust provider API requests"
    );
    metrics::describe_counter!(
        "notifications_total",
        "Lifecycle notifications by delivery outcome"
    );
    metrics::describe_gauge!(
        "issuance_queue_depth",
        "Pending issuance jobs at the last health probe"
    );
}
