use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Reason recorded when the trust provider revokes a credential on its side.
pub const PROVIDER_REVOKED_REASON: &str = "provider_revoked";

/// Principal recorded for revocations that did not come from a user.
pub const SYSTEM_ACTOR: &str = "system";

/// Reasons an administrator may give for revoking a certificate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RevocationReason {
    CompromisedKey,
    CessationOfOperation,
    AffiliationChanged,
    Superseded,
    Fraud,
    QualityIssue,
    ExpiredInspection,
    Administrative,
    Other,
}

/// Append-only revocation ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRecord {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub provider_credential_id: Option<String>,
    pub credential_hash: String,
    pub revoked_by: String,
    pub reason: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRevocationRecord {
    pub certificate_id: Uuid,
    pub provider_credential_id: Option<String>,
    pub credential_hash: String,
    pub revoked_by: String,
    pub reason: String,
    pub metadata: serde_json::Value,
}

/// Administrative revocation request body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    #[garde(skip)]
    pub reason: RevocationReason,

    #[garde(length(max = 1000))]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_format() {
        let reason: RevocationReason = serde_json::from_str("\"quality_issue\"").unwrap();
        assert_eq!(reason, RevocationReason::QualityIssue);
        assert_eq!(RevocationReason::CessationOfOperation.to_string(), "cessation_of_operation");
    }

    #[test]
    fn test_unknown_reason_rejected() {
        let parsed = serde_json::from_str::<RevokeRequest>(r#"{"reason":"provider_revoked"}"#);
        assert!(parsed.is_err());
    }
}
