//! Live provider client against a local fake provider.

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use helpers::*;
use quality_cert::models::credential::{CredentialSubject, IssueRequest};
use quality_cert::models::verification::{VerificationPath, VerificationRequest};
use quality_cert::services::provider::retry::MAX_RETRIES;
use quality_cert::services::provider::{
    CredentialProvider, LiveProvider, MockProvider, ProviderError, RetryPolicy, VerifyTarget,
};
use quality_cert::services::verification::VerificationEngine;
use quality_cert::store::MemoryStore;

const ISSUER: &str = "did:web:quality-cert.dev";

/// Fake provider state: the first `failures` calls answer 503.
#[derive(Clone)]
struct Fake {
    calls: Arc<AtomicUsize>,
    failures: usize,
    failure_status: StatusCode,
}

impl Fake {
    fn new(failures: usize, failure_status: StatusCode) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failures,
            failure_status,
        }
    }

    /// Count the call; `Some` carries the failure response to send.
    fn fail(&self) -> Option<Response> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        (n < self.failures).then(|| (self.failure_status, "upstream down for maintenance").into_response())
    }
}

async fn issue_handler(State(fake): State<Fake>, Json(request): Json<Value>) -> Response {
    if let Some(failure) = fake.fail() {
        return failure;
    }
    Json(json!({
        "credentialId": "cred-123",
        "credentialUrl": "https://provider.test/credentials/cred-123",
        "credential": {
            "id": "urn:credential:cred-123",
            "issuer": request["issuer"],
            "credentialSubject": request["subject"],
        },
    }))
    .into_response()
}

async fn verify_handler(State(fake): State<Fake>) -> Response {
    if let Some(failure) = fake.fail() {
        return failure;
    }
    Json(json!({
        "valid": true,
        "signatureValid": true,
        "revoked": false,
        "issuer": ISSUER,
        "details": "signature checked by provider",
    }))
    .into_response()
}

async fn get_handler(State(fake): State<Fake>) -> Response {
    fake.calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "no such credential").into_response()
}

async fn fake_provider(fake: Fake) -> (String, tokio::sync::oneshot::Sender<()>) {
    let router = Router::new()
        .route("/credentials", post(issue_handler))
        .route("/credentials/verify", post(verify_handler))
        .route("/credentials/{id}", get(get_handler))
        .with_state(fake);
    spawn_server(router).await
}

fn client(base_url: &str) -> LiveProvider {
    LiveProvider::new(
        base_url,
        "test-api-key",
        None,
        Duration::from_secs(5),
        RetryPolicy::new(Duration::from_millis(5)),
    )
    .unwrap()
}

fn issue_request() -> IssueRequest {
    let certificate_id = Uuid::new_v4();
    let batch_id = Uuid::new_v4();
    IssueRequest {
        certificate_id,
        issuer: ISSUER.to_string(),
        subject: CredentialSubject::from_snapshot(certificate_id, &sample_batch(batch_id), None),
        issued_at: Utc::now(),
        expires_at: None,
    }
}

/// A credential that is structurally complete but carries a non-mock proof.
fn signed_credential() -> Value {
    let mut document = MockProvider::new(CREDENTIAL_BASE_URL)
        .fabricate(&issue_request())
        .credential_json;
    document["proof"]["type"] = json!("Ed25519Signature2020");
    document["proof"]["proofValue"] = json!("z3FXQjecWufY46yg5abdVZsXqLhxhueuSoZgNSARiKBk");
    document
}

#[tokio::test]
async fn test_issue_retries_transient_failures() {
    let fake = Fake::new(2, StatusCode::SERVICE_UNAVAILABLE);
    let (base_url, _shutdown) = fake_provider(fake.clone()).await;

    let issued = client(&base_url).issue(&issue_request()).await.unwrap();
    assert_eq!(issued.credential_id, "cred-123");
    assert_eq!(issued.credential_json["issuer"], json!(ISSUER));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_issue_gives_up_after_max_retries() {
    let fake = Fake::new(usize::MAX, StatusCode::SERVICE_UNAVAILABLE);
    let (base_url, _shutdown) = fake_provider(fake.clone()).await;

    let err = client(&base_url).issue(&issue_request()).await.unwrap_err();
    match err {
        ProviderError::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("upstream down"), "body: {body}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1 + MAX_RETRIES as usize);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let fake = Fake::new(usize::MAX, StatusCode::BAD_REQUEST);
    let (base_url, _shutdown) = fake_provider(fake.clone()).await;

    let err = client(&base_url).issue(&issue_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Upstream { status: 400, .. }));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_maps_404_to_not_found() {
    let fake = Fake::new(0, StatusCode::SERVICE_UNAVAILABLE);
    let (base_url, _shutdown) = fake_provider(fake.clone()).await;

    let err = client(&base_url).get("missing").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(id) if id == "missing"));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_provider_is_a_transport_error() {
    let provider = LiveProvider::new(
        "http://127.0.0.1:9",
        "k",
        None,
        Duration::from_millis(200),
        RetryPolicy::new(Duration::from_millis(1)),
    )
    .unwrap();
    let err = provider
        .verify(VerifyTarget {
            json: Some(&json!({})),
            url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn test_verification_uses_provider_when_available() {
    let fake = Fake::new(0, StatusCode::SERVICE_UNAVAILABLE);
    let (base_url, _shutdown) = fake_provider(fake).await;
    let store = Arc::new(MemoryStore::new());
    let engine = VerificationEngine::new(
        Arc::new(client(&base_url)),
        store.clone(),
        store,
        vec![ISSUER.to_string()],
    );

    let verdict = engine
        .verify(VerificationRequest {
            credential_json: Some(signed_credential()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(verdict.valid, "{:?}", verdict.diagnostics);
    assert_eq!(verdict.verified_by, VerificationPath::Provider);
    assert!(verdict.provider_attempted);
}

#[tokio::test]
async fn test_verification_falls_back_to_local_checks() {
    let fake = Fake::new(usize::MAX, StatusCode::BAD_GATEWAY);
    let (base_url, _shutdown) = fake_provider(fake).await;
    let store = Arc::new(MemoryStore::new());
    let engine = VerificationEngine::new(
        Arc::new(client(&base_url)),
        store.clone(),
        store,
        vec![ISSUER.to_string()],
    );

    let verdict = engine
        .verify(VerificationRequest {
            credential_json: Some(signed_credential()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(verdict.valid, "{:?}", verdict.diagnostics);
    assert_eq!(verdict.verified_by, VerificationPath::Local);
    assert!(verdict.provider_attempted);
    assert!(verdict.diagnostics.iter().any(|d| d.contains("provider verification unavailable")));

    // Mock proofs do not pass for a live deployment.
    let mock_signed = MockProvider::new(CREDENTIAL_BASE_URL)
        .fabricate(&issue_request())
        .credential_json;
    let verdict = engine
        .verify(VerificationRequest {
            credential_json: Some(mock_signed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!verdict.signature_valid);
    assert!(!verdict.valid);
}
