use std::sync::Arc;

use uuid::Uuid;

use crate::error::CredentialError;
use crate::models::certificate::Certificate;
use crate::services::provider::CredentialProvider;
use crate::store::CertificateStore;

/// Read access to issued certificates and holder delivery.
pub struct CertificateDirectory {
    certificates: Arc<dyn CertificateStore>,
    provider: Arc<dyn CredentialProvider>,
}

impl CertificateDirectory {
    pub fn new(certificates: Arc<dyn CertificateStore>, provider: Arc<dyn CredentialProvider>) -> Self {
        Self { certificates, provider }
    }

    pub async fn get(&self, id: Uuid) -> Result<Certificate, CredentialError> {
        self.certificates
            .get_certificate(id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(format!("certificate {id}")))
    }

    pub async fn for_batch(&self, batch_id: Uuid) -> Result<Certificate, CredentialError> {
        self.certificates
            .find_by_batch(batch_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(format!("certificate for batch {batch_id}")))
    }

    /// Push the certificate's credential to `recipient` through the provider.
    pub async fn share(&self, id: Uuid, recipient: &str) -> Result<Certificate, CredentialError> {
        let certificate = self.get(id).await?;
        if certificate.revoked {
            return Err(CredentialError::Conflict(format!("certificate {id} is revoked")));
        }
        let credential_id = certificate
            .provider_credential_id
            .as_deref()
            .ok_or_else(|| CredentialError::Conflict(format!("certificate {id} has no provider credential")))?;

        self.provider.push(credential_id, recipient).await?;
        tracing::info!(certificate_id = %id, credential_id, "Credential shared with holder");
        Ok(certificate)
    }
}
