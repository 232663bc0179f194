use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::error::CredentialError;

pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// POST /api/v1/webhooks/provider: takes the raw body so the signature is
/// checked over the exact bytes received.
pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, CredentialError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let outcome = state.webhooks.handle(&body, signature).await?;
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
