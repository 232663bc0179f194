use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credential status reported by a provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStatus {
    Issued,
    Revoked,
    Expired,
    Unknown(String),
}

impl WebhookStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "issued" => WebhookStatus::Issued,
            "revoked" => WebhookStatus::Revoked,
            "expired" => WebhookStatus::Expired,
            _ => WebhookStatus::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookStatus::Issued => "issued",
            WebhookStatus::Revoked => "revoked",
            WebhookStatus::Expired => "expired",
            WebhookStatus::Unknown(raw) => raw.as_str(),
        }
    }
}

/// Authenticated provider notification.
#[derive(Debug, Clone)]
pub struct WebhookNotice {
    pub credential_id: String,
    pub status: WebhookStatus,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    pub raw: Value,
}

/// Wire shape of a provider notification body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookBody {
    #[serde(alias = "credential_id", alias = "id")]
    pub credential_id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl WebhookNotice {
    /// Decode an already-authenticated body.
    pub fn from_json(raw_body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_slice(raw_body)?;
        let body: WebhookBody = serde_json::from_value(raw.clone())?;
        Ok(Self {
            credential_id: body.credential_id,
            status: WebhookStatus::parse(&body.status),
            timestamp: body.timestamp.unwrap_or_else(Utc::now),
            reason: body.reason,
            raw,
        })
    }
}

/// What a webhook delivery did to local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum WebhookOutcome {
    Activated,
    Revoked,
    Expired,
    NoChange,
    Ignored { reason: String },
}
