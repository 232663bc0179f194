use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{AuthenticatedUser, ADMIN_ROLE};
use crate::error::CredentialError;
use crate::models::certificate::Certificate;
use crate::models::revocation::{RevocationRecord, RevokeRequest};
use crate::models::verification::ShareRequest;

/// GET /api/v1/certificates/{id}
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Certificate>, CredentialError> {
    Ok(Json(state.certificates.get(id).await?))
}

/// GET /api/v1/certificates/batch/{batch_id}
pub async fn get_batch_certificate(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<Certificate>, CredentialError> {
    Ok(Json(state.certificates.for_batch(batch_id).await?))
}

/// POST /api/v1/certificates/{id}/revoke: administrators only.
pub async fn revoke_certificate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<Certificate>, CredentialError> {
    user.require_role(ADMIN_ROLE)?;
    request.validate()?;

    let certificate = state.revocations.revoke(id, &request, &user.user_id).await?;
    Ok(Json(certificate))
}

/// GET /api/v1/certificates/{id}/revocations
pub async fn list_revocations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RevocationRecord>>, CredentialError> {
    Ok(Json(state.revocations.list_for_certificate(id).await?))
}

/// POST /api/v1/certificates/{id}/share: deliver the credential to a holder.
pub async fn share_certificate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<Value>, CredentialError> {
    request.validate()?;

    let certificate = state.certificates.share(id, &request.recipient).await?;
    tracing::info!(certificate_id = %id, shared_by = %user.user_id, "Certificate share requested");
    Ok(Json(json!({
        "shared": true,
        "certificateId": certificate.id,
        "credentialUrl": certificate.credential_url,
    })))
}
