use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::CredentialError;
use crate::models::verification::{Verdict, VerificationRequest};

/// POST /api/v1/verify: public credential verification.
pub async fn verify_credential(
    State(state): State<AppState>,
    Json(request): Json<VerificationRequest>,
) -> Result<Json<Verdict>, CredentialError> {
    Ok(Json(state.verifier.verify(request).await?))
}
