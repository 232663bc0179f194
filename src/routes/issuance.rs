use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::CredentialError;
use crate::models::verification::{IssueAccepted, IssueCredentialRequest, JobStatusResponse};

/// POST /api/v1/certificates/issue: queue credential issuance for a batch.
///
/// Answers 202 with the same body whether the job is new or already queued.
pub async fn request_issuance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<IssueCredentialRequest>,
) -> Result<(StatusCode, Json<IssueAccepted>), CredentialError> {
    request.validate()?;

    let job = state
        .issuance
        .enqueue(request.batch_id, request.inspection_id, &user.user_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IssueAccepted {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
        }),
    ))
}

/// GET /api/v1/issuance/jobs/{job_id}
pub async fn get_job_status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, CredentialError> {
    let job = state.issuance.job_status(job_id).await?;
    Ok(Json(job.into()))
}
