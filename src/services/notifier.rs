//! Best-effort lifecycle notifications.
//!
//! Delivery failures are logged and swallowed: the credential state machine
//! never depends on a notification arriving.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CertificateIssued,
    IssuanceFailed,
    CertificateRevoked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub batch_id: Uuid,
    pub certificate_id: Option<Uuid>,
    /// User the notification is addressed to (the batch owner).
    pub recipient_id: Option<Uuid>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("notification endpoint returned HTTP {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Emit `notification`, logging instead of propagating any failure.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    match notifier.notify(&notification).await {
        Ok(()) => {
            metrics::counter!("notifications_total", "outcome" => "delivered").increment(1);
        }
        Err(e) => {
            metrics::counter!("notifications_total", "outcome" => "dropped").increment(1);
            tracing::warn!(
                kind = ?notification.kind,
                batch_id = %notification.batch_id,
                error = %e,
                "Notification dropped"
            );
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = ?notification.kind,
            batch_id = %notification.batch_id,
            certificate_id = ?notification.certificate_id,
            recipient_id = ?notification.recipient_id,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to a configured endpoint.
pub struct HttpNotifier {
    http: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.http.post(&self.url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Notifier selected by configuration: HTTP when a URL is set, log otherwise.
pub fn build_notifier(url: Option<&str>) -> Arc<dyn Notifier> {
    match url.filter(|u| !u.is_empty()).map(HttpNotifier::new) {
        Some(Ok(notifier)) => Arc::new(notifier),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Notification endpoint unusable, logging notifications instead");
            Arc::new(LogNotifier)
        }
        None => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected(503))
        }
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notification = Notification {
            kind: NotificationKind::CertificateRevoked,
            batch_id: Uuid::new_v4(),
            certificate_id: None,
            recipient_id: None,
            message: "revoked".to_string(),
            occurred_at: Utc::now(),
        };
        // Returns unit; reaching the assertion is the test.
        notify_best_effort(&BrokenNotifier, notification).await;
        assert!(matches!(build_notifier(None).notify(&sample()).await, Ok(())));
    }

    fn sample() -> Notification {
        Notification {
            kind: NotificationKind::CertificateIssued,
            batch_id: Uuid::new_v4(),
            certificate_id: Some(Uuid::new_v4()),
            recipient_id: None,
            message: "issued".to_string(),
            occurred_at: Utc::now(),
        }
    }
}
