//! Provider webhook authentication and dispatch.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use helpers::*;
use quality_cert::error::CredentialError;
use quality_cert::models::batch::InspectionOutcome;
use quality_cert::models::certificate::{Certificate, CertificateStatus};
use quality_cert::models::revocation::{PROVIDER_REVOKED_REASON, SYSTEM_ACTOR};
use quality_cert::models::webhook::WebhookOutcome;
use quality_cert::services::provider::{signature, LiveProvider, RetryPolicy};
use quality_cert::services::webhook::WebhookIngress;
use quality_cert::store::{CertificateStore, RevocationLedger};

/// Issue one certificate with the mock provider, then hand back an ingress
/// that authenticates the way the live provider does.
async fn setup() -> (Harness, WebhookIngress, Certificate) {
    let h = Harness::mock();
    let (batch_id, _) = h.seed_batch(InspectionOutcome::Pass);
    h.state.issuance.enqueue(batch_id, None, "admin-1").await.unwrap();
    h.worker.process_next().await.unwrap();
    let certificate = h.state.certificates.for_batch(batch_id).await.unwrap();

    let live = LiveProvider::new(
        "http://127.0.0.1:9",
        "unused",
        Some(WEBHOOK_SECRET.to_string()),
        Duration::from_secs(1),
        RetryPolicy::new(Duration::from_millis(1)),
    )
    .unwrap();
    let ingress = WebhookIngress::new(Arc::new(live), h.store.clone(), h.store.clone());
    (h, ingress, certificate)
}

fn body(credential_id: &str, status: &str, timestamp: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "credentialId": credential_id,
        "status": status,
        "timestamp": timestamp,
    }))
    .unwrap()
}

async fn deliver(ingress: &WebhookIngress, body: &[u8]) -> Result<WebhookOutcome, CredentialError> {
    let sig = signature::sign(WEBHOOK_SECRET, body).unwrap();
    ingress.handle(body, Some(&sig)).await
}

#[tokio::test]
async fn test_revoked_webhook_is_idempotent() {
    let (h, ingress, certificate) = setup().await;
    let credential_id = certificate.provider_credential_id.clone().unwrap();
    let payload = body(&credential_id, "revoked", "2026-01-15T08:30:00Z");

    assert_eq!(deliver(&ingress, &payload).await.unwrap(), WebhookOutcome::Revoked);

    let revoked = h.store.get_certificate(certificate.id).await.unwrap().unwrap();
    assert!(revoked.revoked);
    assert_eq!(revoked.status, CertificateStatus::Revoked);
    assert_eq!(revoked.revoked_by.as_deref(), Some(SYSTEM_ACTOR));
    assert_eq!(revoked.revocation_reason.as_deref(), Some(PROVIDER_REVOKED_REASON));
    let expected: DateTime<Utc> = "2026-01-15T08:30:00Z".parse().unwrap();
    assert_eq!(revoked.revoked_at, Some(expected));

    // Replay changes nothing and appends nothing.
    assert_eq!(deliver(&ingress, &payload).await.unwrap(), WebhookOutcome::NoChange);
    let records = h.store.list_for_certificate(certificate.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, PROVIDER_REVOKED_REASON);

    // Revocation is terminal.
    let reissued = body(&credential_id, "issued", "2026-01-16T08:30:00Z");
    assert_eq!(deliver(&ingress, &reissued).await.unwrap(), WebhookOutcome::NoChange);
    assert!(h.store.get_certificate(certificate.id).await.unwrap().unwrap().revoked);
}

#[tokio::test]
async fn test_tampered_delivery_rejected_without_mutation() {
    let (h, ingress, certificate) = setup().await;
    let credential_id = certificate.provider_credential_id.clone().unwrap();
    let payload = body(&credential_id, "revoked", "2026-01-15T08:30:00Z");
    let sig = signature::sign(WEBHOOK_SECRET, &payload).unwrap();

    let mut tampered = payload.clone();
    let last = tampered.len() - 2;
    tampered[last] ^= 0x01;
    let err = ingress.handle(&tampered, Some(&sig)).await.unwrap_err();
    assert!(matches!(err, CredentialError::Authentication));

    let err = ingress.handle(&payload, None).await.unwrap_err();
    assert!(matches!(err, CredentialError::Authentication));

    let unchanged = h.store.get_certificate(certificate.id).await.unwrap().unwrap();
    assert!(!unchanged.revoked);
    assert_eq!(unchanged.status, CertificateStatus::Active);
    assert!(h.store.list_for_certificate(certificate.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_status_and_credential_acknowledged() {
    let (h, ingress, certificate) = setup().await;
    let credential_id = certificate.provider_credential_id.clone().unwrap();

    let outcome = deliver(&ingress, &body(&credential_id, "suspended", "2026-01-15T08:30:00Z"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    let outcome = deliver(&ingress, &body("never-issued", "revoked", "2026-01-15T08:30:00Z"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    let unchanged = h.store.get_certificate(certificate.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, CertificateStatus::Active);
    assert!(!unchanged.revoked);
}

#[tokio::test]
async fn test_expired_then_reissued() {
    let (h, ingress, certificate) = setup().await;
    let credential_id = certificate.provider_credential_id.clone().unwrap();

    let expired = body(&credential_id, "expired", "2026-01-15T08:30:00Z");
    assert_eq!(deliver(&ingress, &expired).await.unwrap(), WebhookOutcome::Expired);
    assert_eq!(deliver(&ingress, &expired).await.unwrap(), WebhookOutcome::NoChange);

    let current = h.store.get_certificate(certificate.id).await.unwrap().unwrap();
    assert_eq!(current.status, CertificateStatus::Expired);
    assert!(!current.revoked);

    let issued = body(&credential_id, "issued", "2026-01-16T08:30:00Z");
    assert_eq!(deliver(&ingress, &issued).await.unwrap(), WebhookOutcome::Activated);
    assert_eq!(deliver(&ingress, &issued).await.unwrap(), WebhookOutcome::NoChange);
}

#[tokio::test]
async fn test_signed_non_notice_bodies_are_acknowledged() {
    let (h, ingress, certificate) = setup().await;

    for raw in [&br#"{"event":"ping","status":"test"}"#[..], &b"{\"status\":"[..]] {
        let outcome = deliver(&ingress, raw).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }), "{outcome:?}");
    }

    let unchanged = h.store.get_certificate(certificate.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, CertificateStatus::Active);
    assert!(!unchanged.revoked);
}
