use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Product batch owned by the record-keeping side of the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: Uuid,
    pub product_name: String,
    pub variety: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub origin: Option<String>,
    pub harvest_date: Option<NaiveDate>,
    pub farmer_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InspectionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InspectionOutcome {
    Pass,
    Fail,
    Conditional,
}

/// Quality inspection of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub status: InspectionStatus,
    pub outcome: Option<InspectionOutcome>,
    pub grade: Option<String>,
    pub inspector_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Inspection {
    /// Only a completed inspection with a pass outcome gates issuance open.
    pub fn is_passed(&self) -> bool {
        self.status == InspectionStatus::Completed && self.outcome == Some(InspectionOutcome::Pass)
    }
}
