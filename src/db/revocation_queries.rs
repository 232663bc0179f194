use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::revocation::{NewRevocationRecord, RevocationRecord};
use crate::store::StoreError;

const RECORD_COLUMNS: &str =
    "id, certificate_id, provider_credential_id, credential_hash, revoked_by, reason, metadata, created_at";

fn record_from_row(row: &PgRow) -> Result<RevocationRecord, StoreError> {
    Ok(RevocationRecord {
        id: row.try_get("id")?,
        certificate_id: row.try_get("certificate_id")?,
        provider_credential_id: row.try_get("provider_credential_id")?,
        credential_hash: row.try_get("credential_hash")?,
        revoked_by: row.try_get("revoked_by")?,
        reason: row.try_get("reason")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Append a ledger entry. Entries are never updated or deleted.
pub async fn append_record(pool: &PgPool, record: NewRevocationRecord) -> Result<RevocationRecord, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO revocation_records
            (id, certificate_id, provider_credential_id, credential_hash, revoked_by, reason, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(record.certificate_id)
    .bind(&record.provider_credential_id)
    .bind(&record.credential_hash)
    .bind(&record.revoked_by)
    .bind(&record.reason)
    .bind(&record.metadata)
    .fetch_one(pool)
    .await?;

    record_from_row(&row)
}

/// Earliest ledger entry for a credential hash.
pub async fn find_by_hash(pool: &PgPool, credential_hash: &str) -> Result<Option<RevocationRecord>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM revocation_records
        WHERE credential_hash = $1
        ORDER BY created_at ASC
        LIMIT 1
        "#
    ))
    .bind(credential_hash)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

pub async fn list_for_certificate(pool: &PgPool, certificate_id: Uuid) -> Result<Vec<RevocationRecord>, StoreError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM revocation_records
        WHERE certificate_id = $1
        ORDER BY created_at ASC
        "#
    ))
    .bind(certificate_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}
