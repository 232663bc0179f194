use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::certificate::{Certificate, CertificateStatus, NewCertificate, RevocationMark};
use crate::store::StoreError;

const CERTIFICATE_COLUMNS: &str = "id, batch_id, credential, provider_credential_id, credential_url, \
    credential_hash, qr_payload, status, revoked, issued_by, issued_at, expires_at, revoked_at, \
    revoked_by, revocation_reason, metadata";

fn certificate_from_row(row: &PgRow) -> Result<Certificate, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = CertificateStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown certificate status '{status_str}'")))?;

    Ok(Certificate {
        id: row.try_get("id")?,
        batch_id: row.try_get("batch_id")?,
        credential: row.try_get("credential")?,
        provider_credential_id: row.try_get("provider_credential_id")?,
        credential_url: row.try_get("credential_url")?,
        credential_hash: row.try_get("credential_hash")?,
        qr_payload: row.try_get("qr_payload")?,
        status,
        revoked: row.try_get("revoked")?,
        issued_by: row.try_get("issued_by")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
        revoked_by: row.try_get("revoked_by")?,
        revocation_reason: row.try_get("revocation_reason")?,
        metadata: row.try_get("metadata")?,
    })
}

pub async fn insert_certificate(pool: &PgPool, cert: NewCertificate) -> Result<Certificate, StoreError> {
    let batch_id = cert.batch_id;
    let inserted = sqlx::query(&format!(
        r#"
        INSERT INTO certificates
            (id, batch_id, credential, provider_credential_id, credential_url, credential_hash,
             qr_payload, status, revoked, issued_by, issued_at, expires_at, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', FALSE, $8, $9, $10, $11)
        RETURNING {CERTIFICATE_COLUMNS}
        "#
    ))
    .bind(cert.id)
    .bind(cert.batch_id)
    .bind(&cert.credential)
    .bind(&cert.provider_credential_id)
    .bind(&cert.credential_url)
    .bind(&cert.credential_hash)
    .bind(&cert.qr_payload)
    .bind(&cert.issued_by)
    .bind(cert.issued_at)
    .bind(cert.expires_at)
    .bind(&cert.metadata)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(row) => certificate_from_row(&row),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate(
            format!("certificate for batch {batch_id}"),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Indexed columns a certificate can be looked up by.
enum Lookup<'a> {
    Id(Uuid),
    BatchId(Uuid),
    Hash(&'a str),
    ProviderId(&'a str),
    Url(&'a str),
}

impl Lookup<'_> {
    fn column(&self) -> &'static str {
        match self {
            Lookup::Id(_) => "id",
            Lookup::BatchId(_) => "batch_id",
            Lookup::Hash(_) => "credential_hash",
            Lookup::ProviderId(_) => "provider_credential_id",
            Lookup::Url(_) => "credential_url",
        }
    }
}

async fn fetch_one_by(pool: &PgPool, lookup: Lookup<'_>) -> Result<Option<Certificate>, StoreError> {
    let sql = format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE {} = $1 LIMIT 1",
        lookup.column()
    );
    let query = sqlx::query(&sql);
    let query = match lookup {
        Lookup::Id(id) | Lookup::BatchId(id) => query.bind(id),
        Lookup::Hash(value) | Lookup::ProviderId(value) | Lookup::Url(value) => query.bind(value),
    };

    let row = query.fetch_optional(pool).await?;
    row.as_ref().map(certificate_from_row).transpose()
}

pub async fn get_certificate(pool: &PgPool, id: Uuid) -> Result<Option<Certificate>, StoreError> {
    fetch_one_by(pool, Lookup::Id(id)).await
}

pub async fn find_by_batch(pool: &PgPool, batch_id: Uuid) -> Result<Option<Certificate>, StoreError> {
    fetch_one_by(pool, Lookup::BatchId(batch_id)).await
}

pub async fn find_by_hash(pool: &PgPool, hash: &str) -> Result<Option<Certificate>, StoreError> {
    fetch_one_by(pool, Lookup::Hash(hash)).await
}

pub async fn find_by_provider_id(pool: &PgPool, credential_id: &str) -> Result<Option<Certificate>, StoreError> {
    fetch_one_by(pool, Lookup::ProviderId(credential_id)).await
}

pub async fn find_by_credential_url(pool: &PgPool, url: &str) -> Result<Option<Certificate>, StoreError> {
    fetch_one_by(pool, Lookup::Url(url)).await
}

/// Guarded revoke: only rows not yet revoked are touched.
pub async fn mark_revoked(
    pool: &PgPool,
    id: Uuid,
    mark: &RevocationMark,
) -> Result<Option<Certificate>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE certificates
        SET revoked = TRUE,
            status = 'revoked',
            revoked_at = $2,
            revoked_by = $3,
            revocation_reason = $4,
            updated_at = NOW()
        WHERE id = $1 AND revoked = FALSE
        RETURNING {CERTIFICATE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(mark.revoked_at)
    .bind(&mark.revoked_by)
    .bind(&mark.reason)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(certificate_from_row).transpose()
}

pub async fn mark_active(pool: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE certificates
        SET status = 'active', updated_at = NOW()
        WHERE id = $1 AND revoked = FALSE AND status <> 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub async fn mark_expired(pool: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE certificates
        SET status = 'expired', updated_at = NOW()
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}
