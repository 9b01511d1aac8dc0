use tokio_postgres::Row;
use tracing::instrument;

use crate::api::catalog::{NewPosition, PositionUpdate};
use crate::db::util::{foreign_key_violation, unique_violation};
use crate::db::{db_error, PgPool};
use crate::model::Position;

db_error!(PositionStorageError {
    #[error("position not found: {0}")]
    NotFound(i64),
    #[error("position code already exists: {0}")]
    DuplicateCode(String),
    #[error("unknown industry: {0}")]
    UnknownIndustry(i64),
});

const POSITION_COLUMNS: &str = "id, code, name, industry_id, is_active";

fn row_to_position(row: &Row) -> Result<Position, PositionStorageError> {
    Ok(Position {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        industry_id: row.try_get("industry_id")?,
        is_active: row.try_get("is_active")?,
    })
}

#[instrument(skip(pool, position))]
pub async fn create_position(
    pool: &PgPool,
    position: &NewPosition,
) -> Result<Position, PositionStorageError> {
    let client = pool.get().await?;
    let code = position.normalized_code();
    let row = client
        .query_one(
            &format!(
                "INSERT INTO sb.positions (code, name, industry_id, is_active)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {POSITION_COLUMNS}"
            ),
            &[&code, &position.name.trim(), &position.industry_id, &position.is_active],
        )
        .await
        .map_err(|err| {
            if unique_violation(&err).is_some() {
                PositionStorageError::DuplicateCode(code.clone())
            } else if foreign_key_violation(&err).is_some() {
                PositionStorageError::UnknownIndustry(position.industry_id)
            } else {
                err.into()
            }
        })?;
    row_to_position(&row)
}

#[instrument(skip(pool))]
pub async fn list_positions(
    pool: &PgPool,
    industry_id: Option<i64>,
    include_inactive: bool,
) -> Result<Vec<Position>, PositionStorageError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {POSITION_COLUMNS} FROM sb.positions
                 WHERE ($1::BIGINT IS NULL OR industry_id = $1)
                   AND ($2 OR is_active)
                 ORDER BY name, id"
            ),
            &[&industry_id, &include_inactive],
        )
        .await?;
    rows.iter().map(row_to_position).collect()
}

#[instrument(skip(pool))]
pub async fn get_position(
    pool: &PgPool,
    position_id: i64,
    include_inactive: bool,
) -> Result<Option<Position>, PositionStorageError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "SELECT {POSITION_COLUMNS} FROM sb.positions
                 WHERE id = $1 AND ($2 OR is_active)"
            ),
            &[&position_id, &include_inactive],
        )
        .await?;
    row.as_ref().map(row_to_position).transpose()
}

#[instrument(skip(pool, update))]
pub async fn update_position(
    pool: &PgPool,
    position_id: i64,
    update: &PositionUpdate,
) -> Result<Position, PositionStorageError> {
    let client = pool.get().await?;
    let name = update.name.as_deref().map(str::trim);
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.positions
                 SET name = COALESCE($2, name),
                     industry_id = COALESCE($3, industry_id),
                     is_active = COALESCE($4, is_active)
                 WHERE id = $1
                 RETURNING {POSITION_COLUMNS}"
            ),
            &[&position_id, &name, &update.industry_id, &update.is_active],
        )
        .await
        .map_err(|err| match (foreign_key_violation(&err), update.industry_id) {
            (Some(_), Some(industry_id)) => PositionStorageError::UnknownIndustry(industry_id),
            _ => err.into(),
        })?
        .ok_or(PositionStorageError::NotFound(position_id))?;
    row_to_position(&row)
}
