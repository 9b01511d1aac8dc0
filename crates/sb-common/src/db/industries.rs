use tokio_postgres::Row;
use tracing::instrument;

use crate::api::catalog::{IndustryUpdate, NewIndustry};
use crate::db::util::unique_violation;
use crate::db::{db_error, PgPool};
use crate::model::Industry;

db_error!(IndustryStorageError {
    #[error("industry not found: {0}")]
    NotFound(i64),
    #[error("industry code already exists: {0}")]
    DuplicateCode(String),
});

fn row_to_industry(row: &Row) -> Result<Industry, IndustryStorageError> {
    Ok(Industry {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
    })
}

#[instrument(skip(pool, industry))]
pub async fn create_industry(
    pool: &PgPool,
    industry: &NewIndustry,
) -> Result<Industry, IndustryStorageError> {
    let client = pool.get().await?;
    let code = industry.normalized_code();
    let row = client
        .query_one(
            "INSERT INTO sb.industries (code, name, is_active)
             VALUES ($1, $2, $3)
             RETURNING id, code, name, is_active",
            &[&code, &industry.name.trim(), &industry.is_active],
        )
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(_) => IndustryStorageError::DuplicateCode(code.clone()),
            None => err.into(),
        })?;
    row_to_industry(&row)
}

/// Non-deleted industries by name; inactive ones only when asked for.
#[instrument(skip(pool))]
pub async fn list_industries(
    pool: &PgPool,
    include_inactive: bool,
) -> Result<Vec<Industry>, IndustryStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT id, code, name, is_active FROM sb.industries
             WHERE NOT is_deleted AND ($1 OR is_active)
             ORDER BY name, id",
        )
        .await?;
    let rows = client.query(&stmt, &[&include_inactive]).await?;
    rows.iter().map(row_to_industry).collect()
}

#[instrument(skip(pool))]
pub async fn get_industry(
    pool: &PgPool,
    industry_id: i64,
    include_inactive: bool,
) -> Result<Option<Industry>, IndustryStorageError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT id, code, name, is_active FROM sb.industries
             WHERE id = $1 AND NOT is_deleted AND ($2 OR is_active)",
            &[&industry_id, &include_inactive],
        )
        .await?;
    row.as_ref().map(row_to_industry).transpose()
}

#[instrument(skip(pool, update))]
pub async fn update_industry(
    pool: &PgPool,
    industry_id: i64,
    update: &IndustryUpdate,
) -> Result<Industry, IndustryStorageError> {
    let client = pool.get().await?;
    let name = update.name.as_deref().map(str::trim);
    let row = client
        .query_opt(
            "UPDATE sb.industries
             SET name = COALESCE($2, name), is_active = COALESCE($3, is_active)
             WHERE id = $1 AND NOT is_deleted
             RETURNING id, code, name, is_active",
            &[&industry_id, &name, &update.is_active],
        )
        .await?
        .ok_or(IndustryStorageError::NotFound(industry_id))?;
    row_to_industry(&row)
}

/// Soft delete; positions keep their reference.
#[instrument(skip(pool))]
pub async fn delete_industry(pool: &PgPool, industry_id: i64) -> Result<(), IndustryStorageError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE sb.industries SET is_deleted = TRUE, is_active = FALSE
             WHERE id = $1 AND NOT is_deleted",
            &[&industry_id],
        )
        .await?;
    if updated == 0 {
        return Err(IndustryStorageError::NotFound(industry_id));
    }
    Ok(())
}
