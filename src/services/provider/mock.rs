//! Deterministic offline provider.
//!
//! Credentials carry a [`MOCK_PROOF_TYPE`] proof whose value is a digest of
//! the unsigned document. The digest makes tampering visible, but it is a
//! recognizable marker, not a signature: anyone can compute it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::{CredentialProvider, ProviderError, VerifyTarget};
use crate::config::ProviderMode;
use crate::models::credential::{
    date_field, issuer_id, IssueRequest, IssuedCredential, ProviderVerification, CREDENTIALS_CONTEXT_V1,
    MOCK_PROOF_PREFIX, MOCK_PROOF_TYPE, QUALITY_CONTEXT, QUALITY_CREDENTIAL_TYPE, VERIFIABLE_CREDENTIAL_TYPE,
};
use crate::models::webhook::WebhookNotice;
use crate::services::hashing::unsigned_hash;

pub struct MockProvider {
    credential_base_url: String,
    issued: Mutex<HashMap<String, Value>>,
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Proof value the mock provider would stamp on `document`.
pub fn mock_proof_value(document: &Value) -> String {
    format!("{MOCK_PROOF_PREFIX}{}", unsigned_hash(document))
}

/// True when `document` carries an intact mock proof.
pub fn mock_proof_matches(document: &Value) -> bool {
    let Some(proof) = document.get("proof") else {
        return false;
    };
    proof.get("type").and_then(Value::as_str) == Some(MOCK_PROOF_TYPE)
        && proof.get("proofValue").and_then(Value::as_str) == Some(mock_proof_value(document).as_str())
}

impl MockProvider {
    pub fn new(credential_base_url: &str) -> Self {
        Self {
            credential_base_url: credential_base_url.trim_end_matches('/').to_string(),
            issued: Mutex::new(HashMap::new()),
        }
    }

    fn credential_id(request: &IssueRequest) -> String {
        let seed = format!("{}|{}", request.certificate_id, rfc3339(request.issued_at));
        let digest = hex::encode(Sha256::digest(seed.as_bytes()));
        format!("mock-{}", &digest[..24])
    }

    /// Build the signed document for `request`. Pure: equal requests yield
    /// byte-identical credentials.
    pub fn fabricate(&self, request: &IssueRequest) -> IssuedCredential {
        let credential_id = Self::credential_id(request);
        let credential_url = format!("{}/{}", self.credential_base_url, credential_id);

        let mut document = json!({
            "@context": [CREDENTIALS_CONTEXT_V1, QUALITY_CONTEXT],
            "id": format!("urn:credential:{credential_id}"),
            "type": [VERIFIABLE_CREDENTIAL_TYPE, QUALITY_CREDENTIAL_TYPE],
            "issuer": { "id": request.issuer, "name": "Quality Cert (offline)" },
            "issuanceDate": rfc3339(request.issued_at),
            "credentialSubject": request.subject,
        });
        if let Some(expires_at) = request.expires_at {
            document["expirationDate"] = json!(rfc3339(expires_at));
        }

        let proof_value = mock_proof_value(&document);
        document["proof"] = json!({
            "type": MOCK_PROOF_TYPE,
            "created": rfc3339(request.issued_at),
            "proofPurpose": "assertionMethod",
            "verificationMethod": format!("{}#mock-key-1", request.issuer),
            "proofValue": proof_value,
        });

        IssuedCredential {
            credential_id,
            credential_url,
            credential_json: document,
        }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());
        issued.get(key).cloned()
    }

    fn id_from_url(&self, url: &str) -> Option<String> {
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl CredentialProvider for MockProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Mock
    }

    async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredential, ProviderError> {
        let issued = self.fabricate(request);
        tracing::debug!(credential_id = %issued.credential_id, "Mock credential fabricated");
        self.issued
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(issued.credential_id.clone(), issued.credential_json.clone());
        Ok(issued)
    }

    async fn verify(&self, target: VerifyTarget<'_>) -> Result<ProviderVerification, ProviderError> {
        let document = match (target.json, target.url) {
            (Some(json), _) => json.clone(),
            (None, Some(url)) => {
                let id = self
                    .id_from_url(url)
                    .ok_or_else(|| ProviderError::NotFound(url.to_string()))?;
                self.lookup(&id).ok_or(ProviderError::NotFound(id))?
            }
            (None, None) => return Err(ProviderError::Decode("nothing to verify".to_string())),
        };

        let signature_valid = mock_proof_matches(&document);
        let expiration_date = date_field(&document, "expirationDate");
        let expired = expiration_date.is_some_and(|exp| exp <= Utc::now());

        Ok(ProviderVerification {
            valid: signature_valid && !expired,
            signature_valid,
            revoked: false,
            issuer: issuer_id(&document).map(str::to_string),
            issuance_date: date_field(&document, "issuanceDate"),
            expiration_date,
            subject: document.get("credentialSubject").cloned(),
            details: Some("offline provider: proof marker checked, not a cryptographic signature".to_string()),
        })
    }

    async fn get(&self, credential_id: &str) -> Result<Value, ProviderError> {
        self.lookup(credential_id)
            .ok_or_else(|| ProviderError::NotFound(credential_id.to_string()))
    }

    async fn push(&self, credential_id: &str, recipient: &str) -> Result<(), ProviderError> {
        if self.lookup(credential_id).is_none() {
            return Err(ProviderError::NotFound(credential_id.to_string()));
        }
        tracing::info!(credential_id, recipient, "Mock provider recorded credential delivery");
        Ok(())
    }

    fn parse_webhook(&self, raw_body: &[u8], _signature: Option<&str>) -> Result<WebhookNotice, ProviderError> {
        WebhookNotice::from_json(raw_body).map_err(|e| ProviderError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::CredentialSubject;
    use chrono::Duration;
    use uuid::Uuid;

    fn request() -> IssueRequest {
        let certificate_id = Uuid::new_v4();
        let batch_id = Uuid::new_v4();
        IssueRequest {
            certificate_id,
            issuer: "did:web:quality-cert.dev".to_string(),
            subject: CredentialSubject {
                id: format!("urn:batch:{batch_id}"),
                certificate_id,
                batch_id,
                product_name: "Cocoa beans".to_string(),
                variety: Some("Criollo".to_string()),
                quantity: Some(500.0),
                unit: Some("kg".to_string()),
                origin: Some("Sulawesi".to_string()),
                harvest_date: None,
                farmer_id: Uuid::new_v4(),
                inspection: None,
            },
            issued_at: Utc::now(),
            expires_at: Some(Utc::now() + Duration::days(30)),
        }
    }

    #[test]
    fn test_fabrication_is_deterministic() {
        let provider = MockProvider::new("https://c.example/credentials/");
        let req = request();
        let a = provider.fabricate(&req);
        let b = provider.fabricate(&req);
        assert_eq!(a.credential_id, b.credential_id);
        assert_eq!(a.credential_json, b.credential_json);
        assert_eq!(a.credential_url, format!("https://c.example/credentials/{}", a.credential_id));
    }

    #[test]
    fn test_marker_detects_tampering() {
        let provider = MockProvider::new("https://c.example");
        let mut doc = provider.fabricate(&request()).credential_json;
        assert!(mock_proof_matches(&doc));

        doc["credentialSubject"]["quantity"] = json!(5000.0);
        assert!(!mock_proof_matches(&doc));
    }

    #[tokio::test]
    async fn test_issue_then_get_and_verify_by_url() {
        let provider = MockProvider::new("https://c.example");
        let issued = provider.issue(&request()).await.unwrap();

        let fetched = provider.get(&issued.credential_id).await.unwrap();
        assert_eq!(fetched, issued.credential_json);

        let verdict = provider
            .verify(VerifyTarget { json: None, url: Some(&issued.credential_url) })
            .await
            .unwrap();
        assert!(verdict.valid);
        assert!(verdict.signature_valid);
        assert!(!verdict.revoked);
        assert_eq!(verdict.issuer.as_deref(), Some("did:web:quality-cert.dev"));
    }

    #[test]
    fn test_webhook_trusted_without_signature() {
        let provider = MockProvider::new("https://c.example");
        let notice = provider
            .parse_webhook(br#"{"credentialId":"mock-1","status":"issued"}"#, None)
            .unwrap();
        assert_eq!(notice.credential_id, "mock-1");

        assert!(matches!(
            provider.parse_webhook(b"not json", None),
            Err(ProviderError::MalformedPayload(_))
        ));
    }
}
