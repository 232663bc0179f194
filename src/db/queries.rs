use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::job::{IssuanceJob, IssuanceResult, JobInsert, JobStatus, NewIssuanceJob};
use crate::store::StoreError;

const JOB_COLUMNS: &str = "id, batch_id, inspection_id, status, attempts, last_error, result, \
                           payload, created_at, updated_at";

fn job_from_row(row: &PgRow) -> Result<IssuanceJob, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown job status '{status_str}'")))?;

    let result: Option<serde_json::Value> = row.try_get("result")?;
    let payload: serde_json::Value = row.try_get("payload")?;

    Ok(IssuanceJob {
        id: row.try_get("id")?,
        batch_id: row.try_get("batch_id")?,
        inspection_id: row.try_get("inspection_id")?,
        status,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        result: result.map(serde_json::from_value).transpose()?,
        payload: serde_json::from_value(payload)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a pending job, or return the batch's existing non-terminal job.
///
/// The partial unique index on `batch_id` makes the insert itself the
/// arbiter between concurrent enqueues.
pub async fn insert_pending_job(pool: &PgPool, job: NewIssuanceJob) -> Result<JobInsert, StoreError> {
    let payload = serde_json::to_value(&job.payload)?;

    // A conflicting job can turn terminal between the insert and the lookup;
    // in that case the insert is simply attempted again.
    for _ in 0..3 {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO issuance_jobs (id, batch_id, inspection_id, status, payload)
            VALUES ($1, $2, $3, 'pending', $4)
            ON CONFLICT (batch_id) WHERE status IN ('pending', 'processing') DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(job.batch_id)
        .bind(job.inspection_id)
        .bind(&payload)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(JobInsert::Created(job_from_row(&row)?));
        }

        if let Some(existing) = find_active_job(pool, job.batch_id).await? {
            return Ok(JobInsert::Existing(existing));
        }
    }

    Err(StoreError::Corrupt(format!(
        "could not settle an active job for batch {}",
        job.batch_id
    )))
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM issuance_jobs WHERE id = $1"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

pub async fn find_active_job(pool: &PgPool, batch_id: Uuid) -> Result<Option<IssuanceJob>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM issuance_jobs
        WHERE batch_id = $1 AND status IN ('pending', 'processing')
        "#
    ))
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Claim the oldest pending job (pending → processing) in one statement.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<IssuanceJob>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE issuance_jobs
        SET status = 'processing', updated_at = NOW()
        WHERE id = (
            SELECT id FROM issuance_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        AND status = 'pending'
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

pub async fn complete_job(pool: &PgPool, job_id: Uuid, result: &IssuanceResult) -> Result<bool, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE issuance_jobs
        SET status = 'success', result = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(serde_json::to_value(result)?)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub async fn fail_job(pool: &PgPool, job_id: Uuid, error: &str) -> Result<bool, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE issuance_jobs
        SET status = 'failed',
            attempts = attempts + 1,
            last_error = $2,
            updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Number of jobs waiting to be claimed.
pub async fn pending_job_count(pool: &PgPool) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COUNT(*) AS depth FROM issuance_jobs WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("depth")?)
}
