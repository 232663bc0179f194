//! Bearer-token authentication for the administrative routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::CredentialError;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

/// Caller identity taken from a valid HS256 bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn require_role(&self, role: &str) -> Result<(), CredentialError> {
        if self.role == role {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = %self.role, required = role, "Role check failed");
            Err(CredentialError::Forbidden)
        }
    }
}

pub fn validate_token(token: &str, secret: &str) -> Result<AuthenticatedUser, CredentialError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let claims = jsonwebtoken::decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| CredentialError::Authentication)?
        .claims;

    if claims.exp < Utc::now().timestamp() {
        return Err(CredentialError::Authentication);
    }

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Mint a token; used by operators and tests, tokens normally come from the
/// identity service.
pub fn issue_token(secret: &str, sub: &str, role: &str, ttl: chrono::Duration) -> Result<String, CredentialError> {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| CredentialError::Validation(format!("cannot sign token: {e}")))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = CredentialError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(CredentialError::Authentication)?;

        validate_token(token.trim(), &state.config.jwt_secret)
    }
}
