use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::services::provider::ProviderError;
use crate::store::StoreError;

/// Error taxonomy shared by the issuance, verification, revocation and
/// webhook paths.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// Never carries detail; the caller must not learn whether a resource exists.
    #[error("authentication failed")]
    Authentication,

    #[error("forbidden")]
    Forbidden,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<ProviderError> for CredentialError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidSignature(_) => CredentialError::Authentication,
            ProviderError::MalformedPayload(msg) => CredentialError::Validation(msg),
            ProviderError::NotFound(id) => CredentialError::NotFound(format!("credential {id}")),
            other => CredentialError::Provider(other),
        }
    }
}

impl From<garde::Report> for CredentialError {
    fn from(report: garde::Report) -> Self {
        CredentialError::Validation(report.to_string())
    }
}

impl IntoResponse for CredentialError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CredentialError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CredentialError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            CredentialError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            CredentialError::Provider(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            CredentialError::Authentication => (StatusCode::UNAUTHORIZED, self.to_string()),
            CredentialError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            CredentialError::Store(e) => {
                tracing::error!(error = %e, "Storage failure while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
