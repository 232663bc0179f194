//! Read-only access to batch and inspection records owned by the
//! record-keeping side of the platform.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::batch::{Batch, Inspection, InspectionOutcome, InspectionStatus};
use crate::store::StoreError;

const INSPECTION_COLUMNS: &str =
    "id, batch_id, status, outcome, grade, inspector_id, completed_at, notes";

fn batch_from_row(row: &PgRow) -> Result<Batch, StoreError> {
    Ok(Batch {
        id: row.try_get("id")?,
        product_name: row.try_get("product_name")?,
        variety: row.try_get("variety")?,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        origin: row.try_get("origin")?,
        harvest_date: row.try_get("harvest_date")?,
        farmer_id: row.try_get("farmer_id")?,
    })
}

fn inspection_from_row(row: &PgRow) -> Result<Inspection, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = InspectionStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown inspection status '{status_str}'")))?;

    let outcome_str: Option<String> = row.try_get("outcome")?;
    let outcome = outcome_str
        .map(|o| {
            InspectionOutcome::from_str(&o)
                .map_err(|_| StoreError::Corrupt(format!("unknown inspection outcome '{o}'")))
        })
        .transpose()?;

    Ok(Inspection {
        id: row.try_get("id")?,
        batch_id: row.try_get("batch_id")?,
        status,
        outcome,
        grade: row.try_get("grade")?,
        inspector_id: row.try_get("inspector_id")?,
        completed_at: row.try_get("completed_at")?,
        notes: row.try_get("notes")?,
    })
}

pub async fn get_batch(pool: &PgPool, id: Uuid) -> Result<Option<Batch>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, product_name, variety, quantity, unit, origin, harvest_date, farmer_id
        FROM batches
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(batch_from_row).transpose()
}

pub async fn get_inspection(pool: &PgPool, id: Uuid) -> Result<Option<Inspection>, StoreError> {
    let row = sqlx::query(&format!("SELECT {INSPECTION_COLUMNS} FROM inspections WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(inspection_from_row).transpose()
}

/// Most recently completed inspection of a batch.
pub async fn latest_inspection(pool: &PgPool, batch_id: Uuid) -> Result<Option<Inspection>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {INSPECTION_COLUMNS}
        FROM inspections
        WHERE batch_id = $1
        ORDER BY completed_at DESC NULLS LAST, created_at DESC
        LIMIT 1
        "#
    ))
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(inspection_from_row).transpose()
}
