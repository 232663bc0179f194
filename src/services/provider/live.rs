use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{signature, CredentialProvider, ProviderError, RetryPolicy, VerifyTarget};
use crate::config::{AppConfig, ProviderMode};
use crate::models::credential::{IssueRequest, IssuedCredential, ProviderVerification};
use crate::models::webhook::WebhookNotice;

/// Upstream bodies are truncated before they are carried in errors.
const MAX_ERROR_BODY: usize = 512;

/// Client for the hosted trust provider API.
pub struct LiveProvider {
    http: Client,
    base_url: String,
    api_key: String,
    webhook_secret: Option<String>,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueResponse {
    credential_id: String,
    credential_url: String,
    #[serde(alias = "credentialJson")]
    credential: Value,
}

impl LiveProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        webhook_secret: Option<String>,
        timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quality-cert/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            webhook_secret,
            retry,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let base_url = config
            .provider_base_url
            .as_deref()
            .ok_or_else(|| ProviderError::Config("PROVIDER_BASE_URL is not set".to_string()))?;
        let api_key = config
            .provider_api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Config("PROVIDER_API_KEY is not set".to_string()))?;

        Self::new(
            base_url,
            api_key,
            config.webhook_secret.clone(),
            config.provider_timeout(),
            RetryPolicy::new(config.provider_retry_base()),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and decode a successful JSON body.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Value, ProviderError> {
        let started = Instant::now();
        let result = request.bearer_auth(&self.api_key).send().await;
        metrics::histogram!("provider_request_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CredentialProvider for LiveProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Live
    }

    async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredential, ProviderError> {
        let url = self.url("/credentials");
        let body = self
            .retry
            .run("issue", || self.send("issue", self.http.post(&url).json(request)))
            .await?;

        let issued: IssueResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(IssuedCredential {
            credential_id: issued.credential_id,
            credential_url: issued.credential_url,
            credential_json: issued.credential,
        })
    }

    async fn verify(&self, target: VerifyTarget<'_>) -> Result<ProviderVerification, ProviderError> {
        let url = self.url("/credentials/verify");
        let payload = json!({
            "credential": target.json,
            "credentialUrl": target.url,
        });
        let body = self
            .retry
            .run("verify", || self.send("verify", self.http.post(&url).json(&payload)))
            .await?;

        serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn get(&self, credential_id: &str) -> Result<Value, ProviderError> {
        let url = self.url(&format!("/credentials/{credential_id}"));
        match self
            .retry
            .run("get", || self.send("get", self.http.get(&url)))
            .await
        {
            Err(ProviderError::Upstream { status: 404, .. }) => {
                Err(ProviderError::NotFound(credential_id.to_string()))
            }
            other => other,
        }
    }

    async fn push(&self, credential_id: &str, recipient: &str) -> Result<(), ProviderError> {
        let url = self.url(&format!("/credentials/{credential_id}/push"));
        let payload = json!({ "recipient": recipient });
        match self
            .retry
            .run("push", || self.send("push", self.http.post(&url).json(&payload)))
            .await
        {
            Ok(_) => Ok(()),
            Err(ProviderError::Upstream { status: 404, .. }) => {
                Err(ProviderError::NotFound(credential_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn parse_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookNotice, ProviderError> {
        signature::verify(self.webhook_secret.as_deref(), raw_body, signature)?;
        WebhookNotice::from_json(raw_body).map_err(|e| ProviderError::MalformedPayload(e.to_string()))
    }
}
