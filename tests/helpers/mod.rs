//! Shared fixtures for the integration tests: in-memory stores, seeded
//! batches, bearer tokens and throwaway HTTP servers.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use quality_cert::app_state::{issuance_worker, AppState, Stores};
use quality_cert::auth::{issue_token, ADMIN_ROLE};
use quality_cert::config::{AppConfig, ProviderMode};
use quality_cert::models::batch::{Batch, Inspection, InspectionOutcome, InspectionStatus};
use quality_cert::models::credential::{IssueRequest, IssuedCredential, ProviderVerification};
use quality_cert::models::webhook::WebhookNotice;
use quality_cert::services::issuance::IssuanceWorker;
use quality_cert::services::notifier::LogNotifier;
use quality_cert::services::provider::{CredentialProvider, MockProvider, ProviderError, VerifyTarget};
use quality_cert::store::MemoryStore;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789";
pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const CREDENTIAL_BASE_URL: &str = "https://credentials.test/c";

pub fn test_config() -> AppConfig {
    let vars = vec![
        ("DATABASE_URL".to_string(), "postgres://unused".to_string()),
        ("JWT_SECRET".to_string(), JWT_SECRET.to_string()),
        ("CREDENTIAL_BASE_URL".to_string(), CREDENTIAL_BASE_URL.to_string()),
        ("WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string()),
    ];
    envy::from_iter(vars).expect("test config")
}

/// Everything a lifecycle test needs, wired on one in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub stores: Stores,
    pub state: AppState,
    pub worker: IssuanceWorker,
}

impl Harness {
    pub fn mock() -> Self {
        Self::with_provider(Arc::new(MockProvider::new(CREDENTIAL_BASE_URL)))
    }

    pub fn with_provider(provider: Arc<dyn CredentialProvider>) -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::in_memory(store.clone());
        let worker = issuance_worker(&config, &stores, provider.clone(), Arc::new(LogNotifier));
        let state = AppState::new(config, None, &stores, provider, Arc::new(LogNotifier));
        Self {
            store,
            stores,
            state,
            worker,
        }
    }

    /// Worker on the same stores but a different provider.
    pub fn worker_with(&self, provider: Arc<dyn CredentialProvider>) -> IssuanceWorker {
        issuance_worker(&self.state.config, &self.stores, provider, Arc::new(LogNotifier))
    }

    pub fn seed_batch(&self, outcome: InspectionOutcome) -> (Uuid, Uuid) {
        seed_batch(&self.store, outcome)
    }
}

pub fn sample_batch(id: Uuid) -> Batch {
    Batch {
        id,
        product_name: "Robusta coffee".to_string(),
        variety: Some("Robusta".to_string()),
        quantity: Some(1200.0),
        unit: Some("kg".to_string()),
        origin: Some("Dak Lak".to_string()),
        harvest_date: chrono::NaiveDate::from_ymd_opt(2025, 11, 3),
        farmer_id: Uuid::new_v4(),
    }
}

/// Insert a batch with one completed inspection; returns (batch, inspection).
pub fn seed_batch(store: &MemoryStore, outcome: InspectionOutcome) -> (Uuid, Uuid) {
    let batch_id = Uuid::new_v4();
    let inspection_id = Uuid::new_v4();
    store.insert_batch(sample_batch(batch_id));
    store.insert_inspection(Inspection {
        id: inspection_id,
        batch_id,
        status: InspectionStatus::Completed,
        outcome: Some(outcome),
        grade: Some("A".to_string()),
        inspector_id: Some(Uuid::new_v4()),
        completed_at: Some(Utc::now()),
        notes: None,
    });
    (batch_id, inspection_id)
}

pub fn admin_token() -> String {
    issue_token(JWT_SECRET, "admin-1", ADMIN_ROLE, chrono::Duration::minutes(10)).expect("token")
}

pub fn inspector_token() -> String {
    issue_token(JWT_SECRET, "inspector-1", "inspector", chrono::Duration::minutes(10)).expect("token")
}

/// Serve `router` on an ephemeral local port until the sender is dropped.
pub async fn spawn_server(router: Router) -> (String, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .expect("serve");
    });
    (format!("http://{addr}"), tx)
}

/// Provider whose every network operation fails with HTTP 503.
pub struct FailingProvider;

fn unavailable() -> ProviderError {
    ProviderError::Upstream {
        status: 503,
        body: "provider unavailable".to_string(),
    }
}

#[async_trait]
impl CredentialProvider for FailingProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Live
    }

    async fn issue(&self, _request: &IssueRequest) -> Result<IssuedCredential, ProviderError> {
        Err(unavailable())
    }

    async fn verify(&self, _target: VerifyTarget<'_>) -> Result<ProviderVerification, ProviderError> {
        Err(unavailable())
    }

    async fn get(&self, _credential_id: &str) -> Result<Value, ProviderError> {
        Err(unavailable())
    }

    async fn push(&self, _credential_id: &str, _recipient: &str) -> Result<(), ProviderError> {
        Err(unavailable())
    }

    fn parse_webhook(&self, _raw_body: &[u8], _signature: Option<&str>) -> Result<WebhookNotice, ProviderError> {
        Err(ProviderError::InvalidSignature("signature mismatch"))
    }
}
