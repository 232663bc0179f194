use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::CredentialError;
use crate::models::certificate::{Certificate, RevocationMark};
use crate::models::revocation::{NewRevocationRecord, RevocationRecord, RevokeRequest};
use crate::services::hashing::content_hash;
use crate::services::notifier::{notify_best_effort, Notification, NotificationKind, Notifier};
use crate::store::{CertificateStore, RevocationLedger};

/// Administrative revocation and ledger queries.
pub struct RevocationService {
    certificates: Arc<dyn CertificateStore>,
    ledger: Arc<dyn RevocationLedger>,
    notifier: Arc<dyn Notifier>,
}

impl RevocationService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        ledger: Arc<dyn RevocationLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            certificates,
            ledger,
            notifier,
        }
    }

    /// Revoke a certificate on behalf of `actor`.
    ///
    /// A certificate is revoked at most once: the second caller, including
    /// one that loses a race, gets `Conflict`.
    pub async fn revoke(
        &self,
        certificate_id: Uuid,
        request: &RevokeRequest,
        actor: &str,
    ) -> Result<Certificate, CredentialError> {
        let current = self
            .certificates
            .get_certificate(certificate_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(format!("certificate {certificate_id}")))?;
        if current.revoked {
            return Err(CredentialError::Conflict(format!(
                "certificate {certificate_id} is already revoked"
            )));
        }

        let mark = RevocationMark {
            revoked_at: Utc::now(),
            revoked_by: actor.to_string(),
            reason: request.reason.to_string(),
        };
        let revoked = self
            .certificates
            .mark_revoked(certificate_id, &mark)
            .await?
            .ok_or_else(|| {
                CredentialError::Conflict(format!("certificate {certificate_id} was revoked concurrently"))
            })?;

        let credential_hash = revoked
            .credential_hash
            .clone()
            .unwrap_or_else(|| content_hash(&revoked.credential));
        let record = self
            .ledger
            .append(NewRevocationRecord {
                certificate_id,
                provider_credential_id: revoked.provider_credential_id.clone(),
                credential_hash,
                revoked_by: actor.to_string(),
                reason: mark.reason.clone(),
                metadata: json!({ "source": "admin", "note": request.note }),
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    certificate_id = %certificate_id,
                    error = %e,
                    "Certificate flagged revoked but ledger append failed"
                );
            })?;

        metrics::counter!("credential_revocations_total", "source" => "admin").increment(1);
        tracing::info!(
            certificate_id = %certificate_id,
            record_id = %record.id,
            revoked_by = actor,
            reason = %mark.reason,
            "Certificate revoked"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                kind: NotificationKind::CertificateRevoked,
                batch_id: revoked.batch_id,
                certificate_id: Some(certificate_id),
                recipient_id: None,
                message: format!("Quality certificate revoked: {}", mark.reason),
                occurred_at: mark.revoked_at,
            },
        )
        .await;

        Ok(revoked)
    }

    pub async fn list_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<RevocationRecord>, CredentialError> {
        if self.certificates.get_certificate(certificate_id).await?.is_none() {
            return Err(CredentialError::NotFound(format!("certificate {certificate_id}")));
        }
        Ok(self.ledger.list_for_certificate(certificate_id).await?)
    }

    pub async fn find_by_hash(&self, credential_hash: &str) -> Result<Option<RevocationRecord>, CredentialError> {
        Ok(self.ledger.find_by_hash(credential_hash).await?)
    }
}
