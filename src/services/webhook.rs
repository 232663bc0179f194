use std::sync::Arc;

use serde_json::json;

use crate::error::CredentialError;
use crate::models::certificate::RevocationMark;
use crate::models::revocation::{NewRevocationRecord, PROVIDER_REVOKED_REASON, SYSTEM_ACTOR};
use crate::models::webhook::{WebhookNotice, WebhookOutcome, WebhookStatus};
use crate::services::hashing::content_hash;
use crate::services::provider::{CredentialProvider, ProviderError};
use crate::store::{CertificateStore, RevocationLedger};

/// Applies authenticated provider notifications to local state.
pub struct WebhookIngress {
    provider: Arc<dyn CredentialProvider>,
    certificates: Arc<dyn CertificateStore>,
    ledger: Arc<dyn RevocationLedger>,
}

impl WebhookIngress {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        certificates: Arc<dyn CertificateStore>,
        ledger: Arc<dyn RevocationLedger>,
    ) -> Self {
        Self {
            provider,
            certificates,
            ledger,
        }
    }

    /// Authenticate `raw_body` and apply it.
    ///
    /// Only authentication failures are errors. Authenticated deliveries that
    /// do not decode, or name unknown credentials or statuses, are
    /// acknowledged without effect, and repeated deliveries are no-ops.
    pub async fn handle(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome, CredentialError> {
        let notice = match self.provider.parse_webhook(raw_body, signature) {
            Ok(notice) => notice,
            // Signature already passed; the body is just not a status notice.
            Err(ProviderError::MalformedPayload(reason)) => {
                metrics::counter!("provider_webhooks_total", "status" => "undecodable").increment(1);
                tracing::warn!(reason = %reason, "Authenticated webhook is not a status notice, ignoring");
                return Ok(WebhookOutcome::Ignored {
                    reason: format!("undecodable notice: {reason}"),
                });
            }
            Err(e) => {
                metrics::counter!("provider_webhooks_total", "status" => "rejected").increment(1);
                tracing::warn!(error = %e, "Provider webhook rejected");
                return Err(e.into());
            }
        };

        let outcome = self.apply(&notice).await?;
        metrics::counter!("provider_webhooks_total", "status" => notice.status.as_str().to_string()).increment(1);
        tracing::info!(
            credential_id = %notice.credential_id,
            status = notice.status.as_str(),
            outcome = ?outcome,
            "Provider webhook processed"
        );
        Ok(outcome)
    }

    async fn apply(&self, notice: &WebhookNotice) -> Result<WebhookOutcome, CredentialError> {
        if let WebhookStatus::Unknown(status) = &notice.status {
            tracing::warn!(credential_id = %notice.credential_id, status = %status, "Unknown webhook status");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("unknown status {status}"),
            });
        }

        let Some(certificate) = self.certificates.find_by_provider_id(&notice.credential_id).await? else {
            tracing::warn!(credential_id = %notice.credential_id, "Webhook for unknown credential");
            return Ok(WebhookOutcome::Ignored {
                reason: "unknown credential".to_string(),
            });
        };

        let outcome = match notice.status {
            WebhookStatus::Issued => {
                if self.certificates.mark_active(certificate.id).await? {
                    WebhookOutcome::Activated
                } else {
                    WebhookOutcome::NoChange
                }
            }
            WebhookStatus::Expired => {
                if self.certificates.mark_expired(certificate.id).await? {
                    WebhookOutcome::Expired
                } else {
                    WebhookOutcome::NoChange
                }
            }
            WebhookStatus::Revoked => {
                let mark = RevocationMark {
                    revoked_at: notice.timestamp,
                    revoked_by: SYSTEM_ACTOR.to_string(),
                    reason: PROVIDER_REVOKED_REASON.to_string(),
                };
                match self.certificates.mark_revoked(certificate.id, &mark).await? {
                    Some(revoked) => {
                        self.ledger
                            .append(NewRevocationRecord {
                                certificate_id: revoked.id,
                                provider_credential_id: revoked.provider_credential_id.clone(),
                                credential_hash: revoked
                                    .credential_hash
                                    .clone()
                                    .unwrap_or_else(|| content_hash(&revoked.credential)),
                                revoked_by: SYSTEM_ACTOR.to_string(),
                                reason: PROVIDER_REVOKED_REASON.to_string(),
                                metadata: json!({
                                    "source": "webhook",
                                    "providerReason": notice.reason,
                                    "notice": notice.raw,
                                }),
                            })
                            .await?;
                        metrics::counter!("credential_revocations_total", "source" => "webhook").increment(1);
                        WebhookOutcome::Revoked
                    }
                    None => WebhookOutcome::NoChange,
                }
            }
            WebhookStatus::Unknown(_) => WebhookOutcome::NoChange,
        };
        Ok(outcome)
    }
}
