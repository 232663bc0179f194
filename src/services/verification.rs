//! Credential verification: provider check when available, local checks
//! always, and a revocation lookup against the ledger and certificate store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ProviderMode;
use crate::error::CredentialError;
use crate::models::certificate::{Certificate, CertificateStatus};
use crate::models::credential::{
    date_field, issuer_id, subject_certificate_id, ProviderVerification, MOCK_PROOF_TYPE, VERIFIABLE_CREDENTIAL_TYPE,
};
use crate::models::verification::{
    CredentialInput, RevocationSummary, Verdict, VerificationPath, VerificationRequest,
};
use crate::services::hashing::content_hash;
use crate::services::provider::mock::mock_proof_matches;
use crate::services::provider::{CredentialProvider, ProviderError, VerifyTarget};
use crate::services::qr::QrPayload;
use crate::store::{CertificateStore, RevocationLedger, StoreError};

const CREDENTIAL_URN_PREFIX: &str = "urn:credential:";
const REQUIRED_PROOF_FIELDS: [&str; 4] = ["type", "proofPurpose", "verificationMethod", "proofValue"];

/// `expirationDate <= now` counts as expired; no expiration never expires.
pub fn is_expired(expiration: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiration.is_some_and(|exp| exp <= now)
}

/// A credential document plus whatever was learned while resolving it.
struct Resolved {
    document: Value,
    credential_url: Option<String>,
    certificate: Option<Certificate>,
}

/// Outcome of input resolution: a document, or a provider outage that left
/// nothing to check.
enum Resolution {
    Found(Resolved),
    Unavailable { credential_url: String, reason: String },
}

/// Result of the revocation lookup.
#[derive(Default)]
struct RevocationCheck {
    revoked: bool,
    certificate: Option<Certificate>,
    summary: Option<RevocationSummary>,
}

pub struct VerificationEngine {
    provider: Arc<dyn CredentialProvider>,
    certificates: Arc<dyn CertificateStore>,
    ledger: Arc<dyn RevocationLedger>,
    trusted_issuers: Vec<String>,
}

impl VerificationEngine {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        certificates: Arc<dyn CertificateStore>,
        ledger: Arc<dyn RevocationLedger>,
        trusted_issuers: Vec<String>,
    ) -> Self {
        Self {
            provider,
            certificates,
            ledger,
            trusted_issuers,
        }
    }

    pub async fn verify(&self, request: VerificationRequest) -> Result<Verdict, CredentialError> {
        self.verify_at(request, Utc::now()).await
    }

    /// Verify as of `now`.
    ///
    /// Errors only for unusable input (nothing supplied, undecodable QR,
    /// unknown credential). Everything after resolution degrades into the
    /// verdict instead.
    pub async fn verify_at(&self, request: VerificationRequest, now: DateTime<Utc>) -> Result<Verdict, CredentialError> {
        let input = CredentialInput::try_from(request)?;
        let resolved = match self.resolve(input).await? {
            Resolution::Found(resolved) => resolved,
            Resolution::Unavailable { credential_url, reason } => {
                return Ok(self.unresolved_verdict(credential_url, reason, now));
            }
        };
        let document = &resolved.document;
        let mut diagnostics = Vec::new();

        // Provider path
        let provider_attempted = self.provider.mode() == ProviderMode::Live;
        let provider_result = if provider_attempted {
            let target = VerifyTarget {
                json: Some(document),
                url: resolved.credential_url.as_deref(),
            };
            match self.provider.verify(target).await {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(error = %e, "Provider verification failed, falling back to local checks");
                    diagnostics.push(format!("provider verification unavailable: {e}"));
                    None
                }
            }
        } else {
            None
        };

        // Local checks
        let structure_valid = match structure_problem(document) {
            None => true,
            Some(problem) => {
                diagnostics.push(format!("malformed credential: {problem}"));
                false
            }
        };

        let issuer = issuer_id(document).map(str::to_string);
        let issuer_valid = issuer
            .as_deref()
            .is_some_and(|id| self.trusted_issuers.iter().any(|trusted| trusted == id));
        if !issuer_valid {
            diagnostics.push(format!("issuer {} is not trusted", issuer.as_deref().unwrap_or("<missing>")));
        }

        let (signature_valid, verified_by) = match &provider_result {
            Some(result) => (result.signature_valid, VerificationPath::Provider),
            None => {
                let (plausible, note) = self.local_proof(document);
                if let Some(note) = note {
                    diagnostics.push(note);
                }
                (plausible, VerificationPath::Local)
            }
        };

        let expiration_date = date_field(document, "expirationDate")
            .or_else(|| provider_result.as_ref().and_then(|r| r.expiration_date));
        let mut expired = is_expired(expiration_date, now);

        // Revocation
        let credential_hash = content_hash(document);
        let mut revocation_unknown = false;
        let check = match self
            .check_revocation(document, &credential_hash, resolved.certificate)
            .await
        {
            Ok(check) => check,
            Err(e) => {
                tracing::error!(error = %e, credential_hash = %credential_hash, "Revocation lookup failed");
                diagnostics.push(format!("revocation status unavailable: {e}"));
                revocation_unknown = true;
                RevocationCheck::default()
            }
        };
        let provider_revoked = provider_result.as_ref().is_some_and(|r| r.revoked);
        let revoked = check.revoked || provider_revoked;
        if provider_revoked && !check.revoked {
            diagnostics.push("provider reports the credential as revoked".to_string());
        }
        if let Some(certificate) = &check.certificate {
            if certificate.status == CertificateStatus::Expired && !expired {
                diagnostics.push("certificate was marked expired by the provider".to_string());
                expired = true;
            }
        }

        let valid = structure_valid && signature_valid && issuer_valid && !expired && !revoked && !revocation_unknown;

        let verdict = Verdict {
            valid,
            structure_valid,
            signature_valid,
            issuer_valid,
            expired,
            revoked,
            issuer,
            issuance_date: date_field(document, "issuanceDate")
                .or_else(|| provider_result.as_ref().and_then(|r| r.issuance_date)),
            expiration_date,
            subject: document
                .get("credentialSubject")
                .cloned()
                .or_else(|| provider_result.as_ref().and_then(|r| r.subject.clone())),
            credential_hash,
            credential_url: resolved
                .credential_url
                .or_else(|| check.certificate.as_ref().and_then(|c| c.credential_url.clone())),
            certificate_id: check.certificate.as_ref().map(|c| c.id),
            revocation: check.summary,
            details: details(
                valid,
                structure_valid,
                signature_valid,
                issuer_valid,
                expired,
                revoked,
                revocation_unknown,
                provider_result.as_ref(),
            ),
            verified_by,
            provider_attempted,
            diagnostics,
            checked_at: now,
        };

        metrics::counter!(
            "credential_verifications_total",
            "outcome" => if verdict.valid { "valid" } else { "invalid" },
            "path" => verdict.verified_by.to_string()
        )
        .increment(1);
        tracing::info!(
            valid = verdict.valid,
            revoked = verdict.revoked,
            expired = verdict.expired,
            path = %verdict.verified_by,
            certificate_id = ?verdict.certificate_id,
            "Credential verified"
        );

        Ok(verdict)
    }

    /// Verdict for a URL the provider could not serve. Nothing was checked, so
    /// nothing is reported as valid.
    fn unresolved_verdict(&self, credential_url: String, reason: String, now: DateTime<Utc>) -> Verdict {
        metrics::counter!(
            "credential_verifications_total",
            "outcome" => "unresolved",
            "path" => VerificationPath::Local.to_string()
        )
        .increment(1);
        tracing::warn!(credential_url = %credential_url, reason = %reason, "Credential could not be resolved");

        Verdict {
            valid: false,
            structure_valid: false,
            signature_valid: false,
            issuer_valid: false,
            expired: false,
            revoked: false,
            issuer: None,
            issuance_date: None,
            expiration_date: None,
            subject: None,
            credential_hash: String::new(),
            credential_url: Some(credential_url),
            certificate_id: None,
            revocation: None,
            details: "credential could not be resolved: provider unavailable".to_string(),
            verified_by: VerificationPath::Local,
            provider_attempted: true,
            diagnostics: vec![format!("provider lookup failed: {reason}")],
            checked_at: now,
        }
    }

    async fn resolve(&self, input: CredentialInput) -> Result<Resolution, CredentialError> {
        match input {
            CredentialInput::Json(document) => Ok(Resolution::Found(Resolved {
                document,
                credential_url: None,
                certificate: None,
            })),
            CredentialInput::Url(url) => self.resolve_url(url).await,
            CredentialInput::Qr(raw) => {
                let payload = QrPayload::decode(&raw).map_err(|e| CredentialError::Validation(e.to_string()))?;
                let certificate = self
                    .certificates
                    .get_certificate(payload.certificate_id)
                    .await?
                    .ok_or_else(|| CredentialError::NotFound(format!("certificate {}", payload.certificate_id)))?;
                Ok(Resolution::Found(Resolved {
                    document: certificate.credential.clone(),
                    credential_url: certificate.credential_url.clone().or(Some(payload.url)),
                    certificate: Some(certificate),
                }))
            }
        }
    }

    /// Local store first, then the provider. An unknown id is `NotFound`; any
    /// other provider failure yields `Unavailable`.
    async fn resolve_url(&self, url: String) -> Result<Resolution, CredentialError> {
        if let Some(certificate) = self.certificates.find_by_credential_url(&url).await? {
            return Ok(Resolution::Found(Resolved {
                document: certificate.credential.clone(),
                credential_url: Some(url),
                certificate: Some(certificate),
            }));
        }

        let credential_id = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| CredentialError::Validation(format!("cannot derive a credential id from {url}")))?
            .to_string();

        if let Some(certificate) = self.certificates.find_by_provider_id(&credential_id).await? {
            return Ok(Resolution::Found(Resolved {
                document: certificate.credential.clone(),
                credential_url: Some(url),
                certificate: Some(certificate),
            }));
        }

        match self.provider.get(&credential_id).await {
            Ok(document) => Ok(Resolution::Found(Resolved {
                document,
                credential_url: Some(url),
                certificate: None,
            })),
            Err(e @ ProviderError::NotFound(_)) => Err(e.into()),
            Err(e) => Ok(Resolution::Unavailable {
                credential_url: url,
                reason: e.to_string(),
            }),
        }
    }

    /// Proof check used when no provider verdict is available.
    fn local_proof(&self, document: &Value) -> (bool, Option<String>) {
        let Some(proof) = document.get("proof").filter(|p| p.is_object()) else {
            return (false, Some("credential has no proof".to_string()));
        };
        let missing: Vec<&str> = REQUIRED_PROOF_FIELDS
            .iter()
            .copied()
            .filter(|field| !proof.get(*field).and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
            .collect();
        if !missing.is_empty() {
            return (false, Some(format!("proof is missing {}", missing.join(", "))));
        }

        let proof_type = proof.get("type").and_then(Value::as_str).unwrap_or_default();
        match self.provider.mode() {
            ProviderMode::Mock if mock_proof_matches(document) => (true, None),
            ProviderMode::Mock => (false, Some("mock proof does not match the credential".to_string())),
            ProviderMode::Live if proof_type == MOCK_PROOF_TYPE => {
                (false, Some("mock proofs are not accepted in live mode".to_string()))
            }
            ProviderMode::Live => (
                true,
                Some("signature not cryptographically checked; proof is structurally plausible".to_string()),
            ),
        }
    }

    async fn check_revocation(
        &self,
        document: &Value,
        credential_hash: &str,
        known: Option<Certificate>,
    ) -> Result<RevocationCheck, StoreError> {
        let ledger_hit = self.ledger.find_by_hash(credential_hash).await?;
        let certificate = match known {
            Some(certificate) => Some(certificate),
            None => self.match_certificate(document, credential_hash).await?,
        };

        let mut check = RevocationCheck::default();
        if let Some(record) = &ledger_hit {
            check.revoked = true;
            check.summary = Some(RevocationSummary {
                revoked_at: Some(record.created_at),
                revoked_by: Some(record.revoked_by.clone()),
                reason: Some(record.reason.clone()),
                in_ledger: true,
                certificate_flag: false,
            });
        }

        if let Some(certificate) = &certificate {
            let records = self.ledger.list_for_certificate(certificate.id).await?;
            if certificate.revoked || !records.is_empty() {
                check.revoked = true;
                let first = records.first();
                let summary = check.summary.get_or_insert_with(|| RevocationSummary {
                    revoked_at: first.map(|r| r.created_at).or(certificate.revoked_at),
                    revoked_by: first.map(|r| r.revoked_by.clone()).or(certificate.revoked_by.clone()),
                    reason: first.map(|r| r.reason.clone()).or(certificate.revocation_reason.clone()),
                    in_ledger: false,
                    certificate_flag: false,
                });
                summary.in_ledger |= !records.is_empty();
                summary.certificate_flag = certificate.revoked;
            }
        }

        check.certificate = certificate;
        Ok(check)
    }

    /// Find the certificate a document belongs to: by content hash, then
    /// provider credential id, then the subject's certificate id.
    async fn match_certificate(&self, document: &Value, credential_hash: &str) -> Result<Option<Certificate>, StoreError> {
        if let Some(certificate) = self.certificates.find_by_hash(credential_hash).await? {
            return Ok(Some(certificate));
        }

        if let Some(id) = document.get("id").and_then(Value::as_str) {
            let credential_id = id.strip_prefix(CREDENTIAL_URN_PREFIX).unwrap_or(id);
            if let Some(certificate) = self.certificates.find_by_provider_id(credential_id).await? {
                return Ok(Some(certificate));
            }
        }

        match subject_certificate_id(document) {
            Some(id) => self.certificates.get_certificate(id).await,
            None => Ok(None),
        }
    }
}

/// Describe the first structural defect, if any.
fn structure_problem(document: &Value) -> Option<String> {
    if !document.is_object() {
        return Some("credential is not a JSON object".to_string());
    }

    let has_context = match document.get("@context") {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    };
    if !has_context {
        return Some("missing @context".to_string());
    }

    let has_type = match document.get("type") {
        Some(Value::Array(items)) => items.iter().any(|t| t.as_str() == Some(VERIFIABLE_CREDENTIAL_TYPE)),
        Some(Value::String(s)) => s == VERIFIABLE_CREDENTIAL_TYPE,
        _ => false,
    };
    if !has_type {
        return Some(format!("type does not include {VERIFIABLE_CREDENTIAL_TYPE}"));
    }

    if issuer_id(document).is_none() {
        return Some("missing issuer".to_string());
    }
    if date_field(document, "issuanceDate").is_none() {
        return Some("missing or malformed issuanceDate".to_string());
    }
    if !document.get("credentialSubject").is_some_and(Value::is_object) {
        return Some("missing credentialSubject".to_string());
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn details(
    valid: bool,
    structure_valid: bool,
    signature_valid: bool,
    issuer_valid: bool,
    expired: bool,
    revoked: bool,
    revocation_unknown: bool,
    provider: Option<&ProviderVerification>,
) -> String {
    if valid {
        return match provider.and_then(|p| p.details.as_deref()) {
            Some(note) => format!("credential is valid ({note})"),
            None => "credential is valid".to_string(),
        };
    }

    let mut reasons = Vec::new();
    if revoked {
        reasons.push("revoked");
    }
    if expired {
        reasons.push("expired");
    }
    if !signature_valid {
        reasons.push("signature invalid");
    }
    if !issuer_valid {
        reasons.push("issuer not trusted");
    }
    if !structure_valid {
        reasons.push("malformed credential");
    }
    if revocation_unknown {
        reasons.push("revocation status unavailable");
    }
    format!("credential is not valid: {}", reasons.join("; "))
}
