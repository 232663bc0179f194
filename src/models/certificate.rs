use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Revoked,
    Expired,
}

/// An issued quality credential, one per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub credential: serde_json::Value,
    pub provider_credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub credential_hash: Option<String>,
    pub qr_payload: String,
    pub status: CertificateStatus,
    pub revoked: bool,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub revocation_reason: Option<String>,
    pub metadata: serde_json::Value,
}

/// Insert parameters for a freshly minted certificate.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub credential: serde_json::Value,
    pub provider_credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub credential_hash: Option<String>,
    pub qr_payload: String,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl NewCertificate {
    pub fn into_certificate(self) -> Certificate {
        Certificate {
            id: self.id,
            batch_id: self.batch_id,
            credential: self.credential,
            provider_credential_id: self.provider_credential_id,
            credential_url: self.credential_url,
            credential_hash: self.credential_hash,
            qr_payload: self.qr_payload,
            status: CertificateStatus::Active,
            revoked: false,
            issued_by: self.issued_by,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            revoked_at: None,
            revoked_by: None,
            revocation_reason: None,
            metadata: self.metadata,
        }
    }
}

/// Fields written by a guarded revoke transition.
#[derive(Debug, Clone)]
pub struct RevocationMark {
    pub revoked_at: DateTime<Utc>,
    pub revoked_by: String,
    pub reason: String,
}
