//! In-process store used by tests and offline demos.
//!
//! A single mutex serializes every operation, which makes each guarded
//! update trivially atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{CertificateStore, JobStore, RecordSource, RevocationLedger, StoreError};
use crate::models::batch::{Batch, Inspection};
use crate::models::certificate::{Certificate, CertificateStatus, NewCertificate, RevocationMark};
use crate::models::job::{IssuanceJob, IssuanceResult, JobInsert, JobStatus, NewIssuanceJob};
use crate::models::revocation::{NewRevocationRecord, RevocationRecord};

#[derive(Default)]
struct State {
    jobs: Vec<IssuanceJob>,
    certificates: HashMap<Uuid, Certificate>,
    revocations: Vec<RevocationRecord>,
    batches: HashMap<Uuid, Batch>,
    inspections: Vec<Inspection>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_batch(&self, batch: Batch) {
        self.lock().batches.insert(batch.id, batch);
    }

    pub fn insert_inspection(&self, inspection: Inspection) {
        self.lock().inspections.push(inspection);
    }

    /// Replace a batch record, as the record-keeping side would on an edit.
    pub fn update_batch(&self, batch: Batch) {
        self.insert_batch(batch);
    }

    pub fn certificate_count(&self) -> usize {
        self.lock().certificates.len()
    }

    pub fn jobs_for_batch(&self, batch_id: Uuid) -> Vec<IssuanceJob> {
        self.lock()
            .jobs
            .iter()
            .filter(|j| j.batch_id == batch_id)
            .cloned()
            .collect()
    }
}

fn is_active(job: &IssuanceJob) -> bool {
    !job.status.is_terminal()
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_pending(&self, job: NewIssuanceJob) -> Result<JobInsert, StoreError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .jobs
            .iter()
            .find(|j| j.batch_id == job.batch_id && is_active(j))
        {
            return Ok(JobInsert::Existing(existing.clone()));
        }

        let now = Utc::now();
        let created = IssuanceJob {
            id: Uuid::new_v4(),
            batch_id: job.batch_id,
            inspection_id: job.inspection_id,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            result: None,
            payload: job.payload,
            created_at: now,
            updated_at: now,
        };
        state.jobs.push(created.clone());
        Ok(JobInsert::Created(created))
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
        Ok(self.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn find_active_job(&self, batch_id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.batch_id == batch_id && is_active(j))
            .cloned())
    }

    async fn claim_next(&self) -> Result<Option<IssuanceJob>, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| j.status == JobStatus::Pending) else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, id: Uuid, result: &IssuanceResult) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Processing)
        {
            Some(job) => {
                job.status = JobStatus::Success;
                job.result = Some(result.clone());
                job.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fail_job(&self, id: Uuid, error: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Processing)
        {
            Some(job) => {
                job.status = JobStatus::Failed;
                job.attempts += 1;
                job.last_error = Some(error.to_string());
                job.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn insert_certificate(&self, cert: NewCertificate) -> Result<Certificate, StoreError> {
        let mut state = self.lock();
        if state.certificates.values().any(|c| c.batch_id == cert.batch_id) {
            return Err(StoreError::Duplicate(format!(
                "certificate for batch {}",
                cert.batch_id
            )));
        }
        let certificate = cert.into_certificate();
        state.certificates.insert(certificate.id, certificate.clone());
        Ok(certificate)
    }

    async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, StoreError> {
        Ok(self.lock().certificates.get(&id).cloned())
    }

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Option<Certificate>, StoreError> {
        Ok(self
            .lock()
            .certificates
            .values()
            .find(|c| c.batch_id == batch_id)
            .cloned())
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<Certificate>, StoreError> {
        Ok(self
            .lock()
            .certificates
            .values()
            .find(|c| c.credential_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn find_by_provider_id(&self, credential_id: &str) -> Result<Option<Certificate>, StoreError> {
        Ok(self
            .lock()
            .certificates
            .values()
            .find(|c| c.provider_credential_id.as_deref() == Some(credential_id))
            .cloned())
    }

    async fn find_by_credential_url(&self, url: &str) -> Result<Option<Certificate>, StoreError> {
        Ok(self
            .lock()
            .certificates
            .values()
            .find(|c| c.credential_url.as_deref() == Some(url))
            .cloned())
    }

    async fn mark_revoked(&self, id: Uuid, mark: &RevocationMark) -> Result<Option<Certificate>, StoreError> {
        let mut state = self.lock();
        match state.certificates.get_mut(&id) {
            Some(cert) if !cert.revoked => {
                cert.revoked = true;
                cert.status = CertificateStatus::Revoked;
                cert.revoked_at = Some(mark.revoked_at);
                cert.revoked_by = Some(mark.revoked_by.clone());
                cert.revocation_reason = Some(mark.reason.clone());
                Ok(Some(cert.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_active(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.certificates.get_mut(&id) {
            Some(cert) if !cert.revoked && cert.status != CertificateStatus::Active => {
                cert.status = CertificateStatus::Active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.certificates.get_mut(&id) {
            Some(cert) if cert.status == CertificateStatus::Active => {
                cert.status = CertificateStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RevocationLedger for MemoryStore {
    async fn append(&self, record: NewRevocationRecord) -> Result<RevocationRecord, StoreError> {
        let entry = RevocationRecord {
            id: Uuid::new_v4(),
            certificate_id: record.certificate_id,
            provider_credential_id: record.provider_credential_id,
            credential_hash: record.credential_hash,
            revoked_by: record.revoked_by,
            reason: record.reason,
            metadata: record.metadata,
            created_at: Utc::now(),
        };
        self.lock().revocations.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_hash(&self, credential_hash: &str) -> Result<Option<RevocationRecord>, StoreError> {
        Ok(self
            .lock()
            .revocations
            .iter()
            .find(|r| r.credential_hash == credential_hash)
            .cloned())
    }

    async fn list_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<RevocationRecord>, StoreError> {
        Ok(self
            .lock()
            .revocations
            .iter()
            .filter(|r| r.certificate_id == certificate_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordSource for MemoryStore {
    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>, StoreError> {
        Ok(self.lock().batches.get(&id).cloned())
    }

    async fn get_inspection(&self, id: Uuid) -> Result<Option<Inspection>, StoreError> {
        Ok(self.lock().inspections.iter().find(|i| i.id == id).cloned())
    }

    async fn latest_inspection(&self, batch_id: Uuid) -> Result<Option<Inspection>, StoreError> {
        Ok(self
            .lock()
            .inspections
            .iter()
            .filter(|i| i.batch_id == batch_id)
            .max_by_key(|i| i.completed_at)
            .cloned())
    }
}
