use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::batch::{Batch, Inspection, InspectionOutcome};

pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const QUALITY_CONTEXT: &str = "https://schema.quality-cert.dev/credentials/quality/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const QUALITY_CREDENTIAL_TYPE: &str = "ProductQualityCredential";

/// Proof type the mock provider stamps on every credential it fabricates.
pub const MOCK_PROOF_TYPE: &str = "MockProof2024";
/// Prefix of a mock `proofValue`.
pub const MOCK_PROOF_PREFIX: &str = "mock:";

/// Inspection summary embedded in a credential subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InspectionClaim {
    pub inspection_id: Uuid,
    pub outcome: Option<InspectionOutcome>,
    pub grade: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Claims asserted by a quality credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSubject {
    pub id: String,
    pub certificate_id: Uuid,
    pub batch_id: Uuid,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harvest_date: Option<NaiveDate>,
    pub farmer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection: Option<InspectionClaim>,
}

impl CredentialSubject {
    pub fn from_snapshot(certificate_id: Uuid, batch: &Batch, inspection: Option<&Inspection>) -> Self {
        Self {
            id: format!("urn:batch:{}", batch.id),
            certificate_id,
            batch_id: batch.id,
            product_name: batch.product_name.clone(),
            variety: batch.variety.clone(),
            quantity: batch.quantity,
            unit: batch.unit.clone(),
            origin: batch.origin.clone(),
            harvest_date: batch.harvest_date,
            farmer_id: batch.farmer_id,
            inspection: inspection.map(|i| InspectionClaim {
                inspection_id: i.id,
                outcome: i.outcome,
                grade: i.grade.clone(),
                completed_at: i.completed_at,
            }),
        }
    }
}

/// Everything the provider needs to mint one credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub certificate_id: Uuid,
    pub issuer: String,
    pub subject: CredentialSubject,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Credential minted by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub credential_id: String,
    pub credential_url: String,
    pub credential_json: Value,
}

/// Provider-side verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderVerification {
    pub valid: bool,
    pub signature_valid: bool,
    pub revoked: bool,
    pub issuer: Option<String>,
    pub issuance_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub subject: Option<Value>,
    pub details: Option<String>,
}

/// Issuer identifier of a credential document; either a bare string or an
/// object carrying an `id`.
pub fn issuer_id(document: &Value) -> Option<&str> {
    match document.get("issuer")? {
        Value::String(id) => Some(id.as_str()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// Parse an RFC 3339 date field, returning `None` when absent or malformed.
pub fn date_field(document: &Value, field: &str) -> Option<DateTime<Utc>> {
    document
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Certificate id embedded in the credential subject, if any.
pub fn subject_certificate_id(document: &Value) -> Option<Uuid> {
    document
        .pointer("/credentialSubject/certificateId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issuer_id_forms() {
        assert_eq!(issuer_id(&json!({"issuer": "did:web:a"})), Some("did:web:a"));
        assert_eq!(issuer_id(&json!({"issuer": {"id": "did:web:b", "name": "B"}})), Some("did:web:b"));
        assert_eq!(issuer_id(&json!({"issuer": 42})), None);
        assert_eq!(issuer_id(&json!({})), None);
    }

    #[test]
    fn test_date_field() {
        let doc = json!({"issuanceDate": "2025-03-01T10:00:00Z", "bad": "yesterday"});
        assert!(date_field(&doc, "issuanceDate").is_some());
        assert!(date_field(&doc, "bad").is_none());
        assert!(date_field(&doc, "missing").is_none());
    }
}
