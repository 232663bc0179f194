//! Adapter to the external trust provider.
//!
//! One contract, two strategies: [`MockProvider`] for offline operation and
//! [`LiveProvider`] for the networked service. The composition root picks
//! one at startup from [`ProviderMode`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AppConfig, ProviderMode};
use crate::models::credential::{IssueRequest, IssuedCredential, ProviderVerification};
use crate::models::webhook::WebhookNotice;

pub mod live;
pub mod mock;
pub mod retry;
pub mod signature;

pub use live::LiveProvider;
pub use mock::MockProvider;
pub use retry::RetryPolicy;

/// Credential material handed to provider-side verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyTarget<'a> {
    pub json: Option<&'a Value>,
    pub url: Option<&'a str>,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn mode(&self) -> ProviderMode;

    async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredential, ProviderError>;

    async fn verify(&self, target: VerifyTarget<'_>) -> Result<ProviderVerification, ProviderError>;

    async fn get(&self, credential_id: &str) -> Result<Value, ProviderError>;

    /// Deliver an issued credential to a holder.
    async fn push(&self, credential_id: &str, recipient: &str) -> Result<(), ProviderError>;

    /// Authenticate and decode a notification. Authentication happens before
    /// any attempt to parse the body.
    fn parse_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookNotice, ProviderError>;
}

/// Build the provider selected by configuration.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn CredentialProvider>, ProviderError> {
    match config.provider_mode {
        ProviderMode::Mock => {
            tracing::info!("Using mock credential provider");
            Ok(Arc::new(MockProvider::new(&config.credential_base_url)))
        }
        ProviderMode::Live => {
            tracing::info!(base_url = ?config.provider_base_url, "Using live credential provider");
            Ok(Arc::new(LiveProvider::from_config(config)?))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("credential {0} not found at provider")]
    NotFound(String),

    #[error("webhook signature rejected: {0}")]
    InvalidSignature(&'static str),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("provider misconfigured: {0}")]
    Config(String),
}

impl ProviderError {
    /// Transport failures, throttling and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
