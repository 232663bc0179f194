use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::batch::{Batch, Inspection};

/// Status of a credential issuance job in the durable queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    /// Terminal jobs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// Outcome recorded on a job once the credential has been minted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceResult {
    pub credential_id: String,
    pub credential_url: String,
    pub certificate_id: Uuid,
}

/// Batch and inspection state captured when the job was enqueued.
///
/// The worker builds the credential subject from this snapshot only, so
/// concurrent edits to the batch cannot leak into a credential mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceSnapshot {
    pub batch: Batch,
    pub inspection: Option<Inspection>,
    pub requested_by: String,
    pub captured_at: DateTime<Utc>,
}

/// A credential issuance job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceJob {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub inspection_id: Option<Uuid>,
    pub status: JobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub result: Option<IssuanceResult>,
    pub payload: IssuanceSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a new pending job.
#[derive(Debug, Clone)]
pub struct NewIssuanceJob {
    pub batch_id: Uuid,
    pub inspection_id: Option<Uuid>,
    pub payload: IssuanceSnapshot,
}

/// Result of an idempotent enqueue at the storage layer.
#[derive(Debug, Clone)]
pub enum JobInsert {
    Created(IssuanceJob),
    Existing(IssuanceJob),
}

impl JobInsert {
    pub fn into_job(self) -> IssuanceJob {
        match self {
            JobInsert::Created(job) | JobInsert::Existing(job) => job,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, JobInsert::Created(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_job_status_strings() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(JobStatus::from_str("success").unwrap(), JobStatus::Success);
        assert!(JobStatus::from_str("completed").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
