use std::sync::Arc;

use chrono::Utc;
use quality_cert::{
    app_state::{issuance_worker, AppState, Stores},
    config::AppConfig,
    db::{self, queries},
    models::job::JobStatus,
    models::revocation::{RevocationReason, RevokeRequest},
    models::verification::VerificationRequest,
    services::{notifier::LogNotifier, provider::MockProvider},
};
use uuid::Uuid;

/// Integration test: full credential lifecycle on PostgreSQL.
///
/// Covers migrations, the partial unique index behind idempotent enqueue,
/// the SKIP LOCKED claim, certificate persistence and the revocation ledger.
///
/// Note: This requires a running PostgreSQL instance configured via
/// DATABASE_URL (plus JWT_SECRET for config validation).
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_full_integration() {
    let config = AppConfig::from_env().expect("Failed to load config");

    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");

    // Seed the externally owned records.
    let batch_id = Uuid::new_v4();
    let inspection_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO batches (id, product_name, quantity, unit, farmer_id) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(batch_id)
    .bind("Integration cocoa")
    .bind(250.0_f64)
    .bind("kg")
    .bind(Uuid::new_v4())
    .execute(&db_pool)
    .await
    .expect("Failed to insert batch");
    sqlx::query(
        "INSERT INTO inspections (id, batch_id, status, outcome, grade, completed_at) \
         VALUES ($1, $2, 'completed', 'pass', 'A', $3)",
    )
    .bind(inspection_id)
    .bind(batch_id)
    .bind(Utc::now())
    .execute(&db_pool)
    .await
    .expect("Failed to insert inspection");

    let provider = Arc::new(MockProvider::new(&config.credential_base_url));
    let stores = Stores::postgres(db_pool.clone());
    let worker = issuance_worker(&config, &stores, provider.clone(), Arc::new(LogNotifier));
    let state = AppState::new(config, Some(db_pool.clone()), &stores, provider, Arc::new(LogNotifier));

    // 1. Idempotent enqueue
    let job = state
        .issuance
        .enqueue(batch_id, Some(inspection_id), "integration")
        .await
        .expect("Failed to enqueue");
    let again = state
        .issuance
        .enqueue(batch_id, Some(inspection_id), "integration")
        .await
        .expect("Failed to re-enqueue");
    assert_eq!(job.id, again.id);
    assert_eq!(job.status, JobStatus::Pending);
    assert!(queries::pending_job_count(&db_pool).await.expect("count") >= 1);

    // 2. Worker drains the job. Other pending jobs in a shared database may
    //    be claimed first, so loop until ours is terminal.
    for _ in 0..50 {
        worker.process_next().await.expect("Worker failed");
        let current = queries::get_job(&db_pool, job.id).await.expect("get job").expect("job exists");
        if current.status.is_terminal() {
            break;
        }
    }
    let job = queries::get_job(&db_pool, job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(job.status, JobStatus::Success);

    // 3. Certificate persisted and verifiable
    let certificate = state.certificates.for_batch(batch_id).await.expect("certificate");
    let verdict = state
        .verifier
        .verify(VerificationRequest {
            qr_payload: Some(certificate.qr_payload.clone()),
            ..Default::default()
        })
        .await
        .expect("verify");
    assert!(verdict.valid, "{:?}", verdict.diagnostics);

    // 4. Revocation is recorded once
    state
        .revocations
        .revoke(
            certificate.id,
            &RevokeRequest {
                reason: RevocationReason::Administrative,
                note: None,
            },
            "integration",
        )
        .await
        .expect("revoke");
    let records = state
        .revocations
        .list_for_certificate(certificate.id)
        .await
        .expect("list");
    assert_eq!(records.len(), 1);

    let verdict = state
        .verifier
        .verify(VerificationRequest {
            credential_json: Some(certificate.credential.clone()),
            ..Default::default()
        })
        .await
        .expect("verify");
    assert!(verdict.revoked);
    assert!(!verdict.valid);

    println!("✓ Full integration test passed");
}
