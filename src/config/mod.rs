use serde::Deserialize;
use std::time::Duration;
use strum::{Display, EnumString};

/// How the trust provider is reached.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderMode {
    /// Deterministic in-process provider; no network.
    #[default]
    Mock,
    /// HTTP provider with retry and backoff.
    Live,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Secret for HS256 bearer tokens issued by the identity service
    pub jwt_secret: String,

    #[serde(default)]
    pub provider_mode: ProviderMode,

    /// Trust provider API root, required in live mode
    pub provider_base_url: Option<String>,

    /// Trust provider API key, required in live mode
    pub provider_api_key: Option<String>,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// First backoff delay; each retry doubles it.
    #[serde(default = "default_provider_retry_base_ms")]
    pub provider_retry_base_ms: u64,

    /// Shared secret for provider webhook signatures
    pub webhook_secret: Option<String>,

    /// DID this deployment issues credentials as
    #[serde(default = "default_issuer_did")]
    pub issuer_did: String,

    /// Additional trusted issuer identifiers (comma-separated)
    #[serde(default)]
    pub trusted_issuers: Vec<String>,

    /// Public base URL credentials are dereferenced from
    #[serde(default = "default_credential_base_url")]
    pub credential_base_url: String,

    /// Credential validity in days; 0 means credentials never expire
    #[serde(default = "default_credential_validity_days")]
    pub credential_validity_days: Option<i64>,

    /// Refuse issuance for batches without a passed inspection
    #[serde(default = "default_require_inspection")]
    pub require_inspection: bool,

    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    /// Optional endpoint receiving best-effort lifecycle notifications
    pub notification_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    15
}

fn default_provider_retry_base_ms() -> u64 {
    1000
}

fn default_issuer_did() -> String {
    "did:web:quality-cert.dev".to_string()
}

fn default_credential_base_url() -> String {
    "https://quality-cert.dev/credentials".to_string()
}

fn default_credential_validity_days() -> Option<i64> {
    Some(365)
}

fn default_require_inspection() -> bool {
    true
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_mode == ProviderMode::Live {
            if self.provider_base_url.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Missing("PROVIDER_BASE_URL"));
            }
            if self.provider_api_key.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Missing("PROVIDER_API_KEY"));
            }
        }
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::Invalid("JWT_SECRET must be at least 16 bytes".to_string()));
        }
        Ok(())
    }

    /// Issuers accepted during verification; always includes our own DID.
    pub fn trusted_issuer_list(&self) -> Vec<String> {
        let mut issuers = vec![self.issuer_did.clone()];
        for issuer in &self.trusted_issuers {
            let issuer = issuer.trim();
            if !issuer.is_empty() && !issuers.iter().any(|i| i == issuer) {
                issuers.push(issuer.to_string());
            }
        }
        issuers
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn provider_retry_base(&self) -> Duration {
        Duration::from_millis(self.provider_retry_base_ms)
    }

    pub fn credential_validity(&self) -> Option<chrono::Duration> {
        self.credential_validity_days
            .filter(|days| *days > 0)
            .map(chrono::Duration::days)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
