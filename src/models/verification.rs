use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;
use uuid::Uuid;

use crate::error::CredentialError;
use crate::models::job::{IssuanceJob, IssuanceResult, JobStatus};

/// Request to issue a credential for a batch.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialRequest {
    #[garde(skip)]
    pub batch_id: Uuid,

    #[garde(skip)]
    pub inspection_id: Option<Uuid>,
}

/// Response after accepting an issuance request; identical for new and
/// already-pending jobs.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Response for querying issuance job status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub inspection_id: Option<Uuid>,
    pub status: JobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub result: Option<IssuanceResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IssuanceJob> for JobStatusResponse {
    fn from(job: IssuanceJob) -> Self {
        Self {
            id: job.id,
            batch_id: job.batch_id,
            inspection_id: job.inspection_id,
            status: job.status,
            attempts: job.attempts,
            last_error: job.last_error,
            result: job.result,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Request to deliver a credential to a holder.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    #[garde(length(min = 3, max = 320))]
    pub recipient: String,
}

/// Verification request; exactly one field must be supplied.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub credential_json: Option<Value>,
    pub credential_url: Option<String>,
    pub qr_payload: Option<String>,
}

/// The single credential input variant a verification operates on.
#[derive(Debug, Clone)]
pub enum CredentialInput {
    Json(Value),
    Url(String),
    Qr(String),
}

impl TryFrom<VerificationRequest> for CredentialInput {
    type Error = CredentialError;

    fn try_from(req: VerificationRequest) -> Result<Self, Self::Error> {
        let credential_url = req.credential_url.filter(|u| !u.trim().is_empty());
        let qr_payload = req.qr_payload.filter(|q| !q.trim().is_empty());
        let credential_json = req.credential_json.filter(|v| !v.is_null());

        match (credential_json, credential_url, qr_payload) {
            (Some(json), None, None) => Ok(CredentialInput::Json(json)),
            (None, Some(url), None) => Ok(CredentialInput::Url(url)),
            (None, None, Some(qr)) => Ok(CredentialInput::Qr(qr)),
            (None, None, None) => Err(CredentialError::Validation(
                "one of credentialJson, credentialUrl or qrPayload is required".to_string(),
            )),
            _ => Err(CredentialError::Validation(
                "supply exactly one of credentialJson, credentialUrl or qrPayload".to_string(),
            )),
        }
    }
}

/// Which verification path produced a verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationPath {
    Provider,
    Local,
}

/// Revocation details surfaced in a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationSummary {
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub reason: Option<String>,
    pub in_ledger: bool,
    pub certificate_flag: bool,
}

/// Structured verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    pub structure_valid: bool,
    pub signature_valid: bool,
    pub issuer_valid: bool,
    pub expired: bool,
    pub revoked: bool,
    pub issuer: Option<String>,
    pub issuance_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub subject: Option<Value>,
    pub credential_hash: String,
    pub credential_url: Option<String>,
    pub certificate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationSummary>,
    pub details: String,
    pub verified_by: VerificationPath,
    pub provider_attempted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub diagnostics: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exactly_one_input() {
        let none = VerificationRequest::default();
        assert!(matches!(
            CredentialInput::try_from(none),
            Err(CredentialError::Validation(_))
        ));

        let two = VerificationRequest {
            credential_json: Some(json!({})),
            qr_payload: Some("QC1.abc".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CredentialInput::try_from(two),
            Err(CredentialError::Validation(_))
        ));

        let url = VerificationRequest {
            credential_url: Some("https://c.example/x".to_string()),
            qr_payload: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(CredentialInput::try_from(url), Ok(CredentialInput::Url(_))));
    }
}
