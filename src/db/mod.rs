use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::batch::{Batch, Inspection};
use crate::models::certificate::{Certificate, NewCertificate, RevocationMark};
use crate::models::job::{IssuanceJob, IssuanceResult, JobInsert, NewIssuanceJob};
use crate::models::revocation::{NewRevocationRecord, RevocationRecord};
use crate::store::{CertificateStore, JobStore, RecordSource, RevocationLedger, StoreError};

pub mod certificate_queries;
pub mod queries;
pub mod record_queries;
pub mod revocation_queries;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// PostgreSQL-backed implementation of every store seam.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_pending(&self, job: NewIssuanceJob) -> Result<JobInsert, StoreError> {
        queries::insert_pending_job(&self.pool, job).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
        queries::get_job(&self.pool, id).await
    }

    async fn find_active_job(&self, batch_id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
        queries::find_active_job(&self.pool, batch_id).await
    }

    async fn claim_next(&self) -> Result<Option<IssuanceJob>, StoreError> {
        queries::claim_next_job(&self.pool).await
    }

    async fn complete_job(&self, id: Uuid, result: &IssuanceResult) -> Result<bool, StoreError> {
        queries::complete_job(&self.pool, id, result).await
    }

    async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, StoreError> {
        queries::fail_job(&self.pool, id, error).await
    }
}

#[async_trait]
impl CertificateStore for PgStore {
    async fn insert_certificate(&self, cert: NewCertificate) -> Result<Certificate, StoreError> {
        certificate_queries::insert_certificate(&self.pool, cert).await
    }

    async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::get_certificate(&self.pool, id).await
    }

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::find_by_batch(&self.pool, batch_id).await
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::find_by_hash(&self.pool, hash).await
    }

    async fn find_by_provider_id(&self, credential_id: &str) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::find_by_provider_id(&self.pool, credential_id).await
    }

    async fn find_by_credential_url(&self, url: &str) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::find_by_credential_url(&self.pool, url).await
    }

    async fn mark_revoked(&self, id: Uuid, mark: &RevocationMark) -> Result<Option<Certificate>, StoreError> {
        certificate_queries::mark_revoked(&self.pool, id, mark).await
    }

    async fn mark_active(&self, id: Uuid) -> Result<bool, StoreError> {
        certificate_queries::mark_active(&self.pool, id).await
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool, StoreError> {
        certificate_queries::mark_expired(&self.pool, id).await
    }
}

#[async_trait]
impl RevocationLedger for PgStore {
    async fn append(&self, record: NewRevocationRecord) -> Result<RevocationRecord, StoreError> {
        revocation_queries::append_record(&self.pool, record).await
    }

    async fn find_by_hash(&self, credential_hash: &str) -> Result<Option<RevocationRecord>, StoreError> {
        revocation_queries::find_by_hash(&self.pool, credential_hash).await
    }

    async fn list_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<RevocationRecord>, StoreError> {
        revocation_queries::list_for_certificate(&self.pool, certificate_id).await
    }
}

#[async_trait]
impl RecordSource for PgStore {
    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>, StoreError> {
        record_queries::get_batch(&self.pool, id).await
    }

    async fn get_inspection(&self, id: Uuid) -> Result<Option<Inspection>, StoreError> {
        record_queries::get_inspection(&self.pool, id).await
    }

    async fn latest_inspection(&self, batch_id: Uuid) -> Result<Option<Inspection>, StoreError> {
        record_queries::latest_inspection(&self.pool, batch_id).await
    }
}
