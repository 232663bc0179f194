//! Storage seams for the credential lifecycle.
//!
//! Every mutation that races with another actor (worker claim, webhook,
//! administrator) is a guarded conditional update: implementations must apply
//! the guard and the write atomically and report whether the write happened.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::batch::{Batch, Inspection};
use crate::models::certificate::{Certificate, NewCertificate, RevocationMark};
use crate::models::job::{IssuanceJob, IssuanceResult, JobInsert, NewIssuanceJob};
use crate::models::revocation::{NewRevocationRecord, RevocationRecord};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job unless a pending/processing job already exists
    /// for the batch, in which case that job is returned.
    async fn insert_pending(&self, job: NewIssuanceJob) -> Result<JobInsert, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<IssuanceJob>, StoreError>;

    async fn find_active_job(&self, batch_id: Uuid) -> Result<Option<IssuanceJob>, StoreError>;

    /// Atomically move the oldest pending job to processing and return it.
    async fn claim_next(&self) -> Result<Option<IssuanceJob>, StoreError>;

    /// processing → success. Returns false when the job was not processing.
    async fn complete_job(&self, id: Uuid, result: &IssuanceResult) -> Result<bool, StoreError>;

    /// processing → failed, bumping `attempts`. Returns false when the job was
    /// not processing.
    async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the batch already has one.
    async fn insert_certificate(&self, cert: NewCertificate) -> Result<Certificate, StoreError>;

    async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, StoreError>;

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Option<Certificate>, StoreError>;

    async fn find_by_hash(&self, hash: &str) -> Result<Option<Certificate>, StoreError>;

    async fn find_by_provider_id(&self, credential_id: &str) -> Result<Option<Certificate>, StoreError>;

    async fn find_by_credential_url(&self, url: &str) -> Result<Option<Certificate>, StoreError>;

    /// Flip to revoked only if not already revoked. Returns the updated
    /// certificate, or `None` when the guard did not match.
    async fn mark_revoked(&self, id: Uuid, mark: &RevocationMark) -> Result<Option<Certificate>, StoreError>;

    /// Flip to active only if neither active nor revoked.
    async fn mark_active(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Flip to expired only if currently active. Leaves `revoked` untouched.
    async fn mark_expired(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RevocationLedger: Send + Sync {
    async fn append(&self, record: NewRevocationRecord) -> Result<RevocationRecord, StoreError>;

    async fn find_by_hash(&self, credential_hash: &str) -> Result<Option<RevocationRecord>, StoreError>;

    async fn list_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<RevocationRecord>, StoreError>;
}

/// Read-only view of batch and inspection records owned elsewhere.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>, StoreError>;

    async fn get_inspection(&self, id: Uuid) -> Result<Option<Inspection>, StoreError>;

    async fn latest_inspection(&self, batch_id: Uuid) -> Result<Option<Inspection>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}
