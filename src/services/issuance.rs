//! Durable credential issuance: idempotent enqueue plus a worker that drains
//! the queue one job at a time.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::CredentialError;
use crate::models::batch::Inspection;
use crate::models::certificate::{Certificate, NewCertificate};
use crate::models::credential::{date_field, CredentialSubject, IssueRequest};
use crate::models::job::{IssuanceJob, IssuanceResult, IssuanceSnapshot, NewIssuanceJob};
use crate::services::hashing::content_hash;
use crate::services::notifier::{notify_best_effort, Notification, NotificationKind, Notifier};
use crate::services::provider::CredentialProvider;
use crate::services::qr::QrPayload;
use crate::store::{CertificateStore, JobStore, RecordSource, StoreError};

/// Accepts issuance requests and reports job status.
pub struct IssuanceQueue {
    jobs: Arc<dyn JobStore>,
    certificates: Arc<dyn CertificateStore>,
    records: Arc<dyn RecordSource>,
    require_inspection: bool,
}

impl IssuanceQueue {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        certificates: Arc<dyn CertificateStore>,
        records: Arc<dyn RecordSource>,
        require_inspection: bool,
    ) -> Self {
        Self {
            jobs,
            certificates,
            records,
            require_inspection,
        }
    }

    /// Queue issuance for a batch.
    ///
    /// Returns the batch's existing pending/processing job instead of creating
    /// a second one.
    pub async fn enqueue(
        &self,
        batch_id: Uuid,
        inspection_id: Option<Uuid>,
        requested_by: &str,
    ) -> Result<IssuanceJob, CredentialError> {
        let batch = self
            .records
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(format!("batch {batch_id}")))?;

        if let Some(existing) = self.certificates.find_by_batch(batch_id).await? {
            return Err(CredentialError::Conflict(format!(
                "batch {batch_id} already has certificate {}",
                existing.id
            )));
        }

        if let Some(job) = self.jobs.find_active_job(batch_id).await? {
            tracing::debug!(job_id = %job.id, batch_id = %batch_id, "Returning existing issuance job");
            return Ok(job);
        }

        let inspection = self.gate_inspection(batch_id, inspection_id).await?;

        let inserted = self
            .jobs
            .insert_pending(NewIssuanceJob {
                batch_id,
                inspection_id: inspection.as_ref().map(|i| i.id),
                payload: IssuanceSnapshot {
                    batch,
                    inspection,
                    requested_by: requested_by.to_string(),
                    captured_at: Utc::now(),
                },
            })
            .await?;

        if inserted.was_created() {
            metrics::counter!("credential_issuance_total", "outcome" => "enqueued").increment(1);
        }
        let job = inserted.into_job();
        tracing::info!(job_id = %job.id, batch_id = %batch_id, requested_by, "Issuance job queued");
        Ok(job)
    }

    /// Resolve the inspection that authorizes issuance, if one is required.
    async fn gate_inspection(
        &self,
        batch_id: Uuid,
        inspection_id: Option<Uuid>,
    ) -> Result<Option<Inspection>, CredentialError> {
        let inspection = match inspection_id {
            Some(id) => {
                let inspection = self
                    .records
                    .get_inspection(id)
                    .await?
                    .ok_or_else(|| CredentialError::NotFound(format!("inspection {id}")))?;
                if inspection.batch_id != batch_id {
                    return Err(CredentialError::Validation(format!(
                        "inspection {id} does not belong to batch {batch_id}"
                    )));
                }
                Some(inspection)
            }
            None if self.require_inspection => Some(
                self.records
                    .latest_inspection(batch_id)
                    .await?
                    .ok_or_else(|| {
                        CredentialError::Validation(format!("batch {batch_id} has no inspection"))
                    })?,
            ),
            None => None,
        };

        if let Some(inspection) = &inspection {
            if !inspection.is_passed() {
                return Err(CredentialError::Validation(format!(
                    "inspection {} is not completed with a pass outcome (status {}, outcome {})",
                    inspection.id,
                    inspection.status,
                    inspection.outcome.map_or("none".to_string(), |o| o.to_string()),
                )));
            }
        }
        Ok(inspection)
    }

    pub async fn job_status(&self, job_id: Uuid) -> Result<IssuanceJob, CredentialError> {
        self.jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(format!("issuance job {job_id}")))
    }
}

/// Issuer identity and policy applied to every minted credential.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub issuer_did: String,
    pub validity: Option<chrono::Duration>,
}

/// Drains the issuance queue.
pub struct IssuanceWorker {
    jobs: Arc<dyn JobStore>,
    certificates: Arc<dyn CertificateStore>,
    provider: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
    settings: IssuerSettings,
}

impl IssuanceWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        certificates: Arc<dyn CertificateStore>,
        provider: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
        settings: IssuerSettings,
    ) -> Self {
        Self {
            jobs,
            certificates,
            provider,
            notifier,
            settings,
        }
    }

    /// Claim and process the next pending job.
    ///
    /// Returns `Ok(false)` when the queue is empty. Job failures are recorded
    /// on the job; only storage failures around the claim surface as errors.
    pub async fn process_next(&self) -> Result<bool, CredentialError> {
        let Some(job) = self.jobs.claim_next().await? else {
            return Ok(false);
        };

        tracing::info!(job_id = %job.id, batch_id = %job.batch_id, "Processing issuance job");
        let started = std::time::Instant::now();
        let farmer_id = job.payload.batch.farmer_id;

        match self.mint(&job).await {
            Ok(certificate) => {
                let result = IssuanceResult {
                    credential_id: certificate.provider_credential_id.clone().unwrap_or_default(),
                    credential_url: certificate.credential_url.clone().unwrap_or_default(),
                    certificate_id: certificate.id,
                };
                if !self.jobs.complete_job(job.id, &result).await? {
                    tracing::warn!(job_id = %job.id, "Job left processing before completion was recorded");
                }

                metrics::counter!("credential_issuance_total", "outcome" => "success").increment(1);
                metrics::histogram!("credential_issuance_seconds").record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %job.id,
                    certificate_id = %certificate.id,
                    credential_id = %result.credential_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Credential issued"
                );

                notify_best_effort(
                    self.notifier.as_ref(),
                    Notification {
                        kind: NotificationKind::CertificateIssued,
                        batch_id: job.batch_id,
                        certificate_id: Some(certificate.id),
                        recipient_id: Some(farmer_id),
                        message: format!("Quality certificate issued for {}", job.payload.batch.product_name),
                        occurred_at: Utc::now(),
                    },
                )
                .await;
            }
            Err(e) => {
                let message = e.to_string();
                self.jobs.fail_job(job.id, &message).await?;

                metrics::counter!("credential_issuance_total", "outcome" => "failed").increment(1);
                tracing::error!(job_id = %job.id, batch_id = %job.batch_id, error = %message, "Issuance job failed");

                notify_best_effort(
                    self.notifier.as_ref(),
                    Notification {
                        kind: NotificationKind::IssuanceFailed,
                        batch_id: job.batch_id,
                        certificate_id: None,
                        recipient_id: Some(farmer_id),
                        message: format!("Certificate issuance failed: {message}"),
                        occurred_at: Utc::now(),
                    },
                )
                .await;
            }
        }

        Ok(true)
    }

    /// Mint the credential for a claimed job and persist its certificate.
    async fn mint(&self, job: &IssuanceJob) -> Result<Certificate, CredentialError> {
        let snapshot = &job.payload;

        if let Some(existing) = self.certificates.find_by_batch(job.batch_id).await? {
            return Err(CredentialError::Conflict(format!(
                "batch {} already has certificate {}",
                job.batch_id, existing.id
            )));
        }

        let certificate_id = Uuid::new_v4();
        let issued_at = Utc::now();
        let request = IssueRequest {
            certificate_id,
            issuer: self.settings.issuer_did.clone(),
            subject: CredentialSubject::from_snapshot(certificate_id, &snapshot.batch, snapshot.inspection.as_ref()),
            issued_at,
            expires_at: self.settings.validity.map(|validity| issued_at + validity),
        };

        let issued = self.provider.issue(&request).await.map_err(CredentialError::Provider)?;

        let credential_hash = content_hash(&issued.credential_json);
        let expires_at = date_field(&issued.credential_json, "expirationDate").or(request.expires_at);
        let qr_payload = QrPayload {
            certificate_id,
            batch_id: job.batch_id,
            url: issued.credential_url.clone(),
        }
        .encode();

        let certificate = NewCertificate {
            id: certificate_id,
            batch_id: job.batch_id,
            credential: issued.credential_json,
            provider_credential_id: Some(issued.credential_id),
            credential_url: Some(issued.credential_url),
            credential_hash: Some(credential_hash),
            qr_payload,
            issued_by: snapshot.requested_by.clone(),
            issued_at,
            expires_at,
            metadata: json!({
                "jobId": job.id,
                "inspectionId": job.inspection_id,
                "farmerId": snapshot.batch.farmer_id,
                "providerMode": self.provider.mode().to_string(),
            }),
        };

        match self.certificates.insert_certificate(certificate).await {
            Ok(certificate) => Ok(certificate),
            Err(StoreError::Duplicate(what)) => {
                tracing::warn!(job_id = %job.id, "Credential minted but {what} already exists");
                Err(CredentialError::Conflict(format!("{what} already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }
}
