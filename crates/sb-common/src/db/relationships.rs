use tokio_postgres::Row;
use tracing::{info, instrument};

use crate::api::relationships::{RelationshipFilter, RelationshipUpsert};
use crate::api::{ListResponse, Pagination};
use crate::db::users::active_role;
use crate::db::util::parse_enum;
use crate::db::{db_error, PgPool};
use crate::model::{UserRole, WorkerRelationship};

db_error!(RelationshipStorageError {
    #[error("no relationship with worker {0}")]
    NotFound(i64),
    #[error("user {0} is not an active worker")]
    NotAWorker(i64),
    #[error("unexpected relationship row: {0}")]
    Mapping(String),
});

type Result<T> = std::result::Result<T, RelationshipStorageError>;

const RELATIONSHIP_COLUMNS: &str = "id, organization_id, worker_id, relationship_type, notes, \
     tags, created_by, created_at, updated_at";

fn row_to_relationship(row: &Row) -> Result<WorkerRelationship> {
    Ok(WorkerRelationship {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        worker_id: row.try_get("worker_id")?,
        relationship_type: parse_enum(row, "relationship_type")
            .map_err(RelationshipStorageError::Mapping)?,
        notes: row.try_get("notes")?,
        tags: row.try_get("tags")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Sets the organization's tag for a worker, replacing notes and tags.
#[instrument(skip(pool, upsert), fields(worker_id = upsert.worker_id))]
pub async fn upsert_relationship(
    pool: &PgPool,
    organization_id: i64,
    created_by: Option<i64>,
    upsert: &RelationshipUpsert,
) -> Result<WorkerRelationship> {
    let client = pool.get().await?;
    if active_role(&client, upsert.worker_id).await? != Some(UserRole::Worker) {
        return Err(RelationshipStorageError::NotAWorker(upsert.worker_id));
    }

    let row = client
        .query_one(
            &format!(
                "INSERT INTO sb.worker_relationships (
                    organization_id, worker_id, relationship_type, notes, tags, created_by
                 ) VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT ON CONSTRAINT uq_worker_relationships_pair DO UPDATE SET
                    relationship_type = EXCLUDED.relationship_type,
                    notes = EXCLUDED.notes,
                    tags = EXCLUDED.tags,
                    updated_at = NOW()
                 RETURNING {RELATIONSHIP_COLUMNS}"
            ),
            &[
                &organization_id,
                &upsert.worker_id,
                &upsert.relationship_type.as_ref(),
                &upsert.notes,
                &upsert.normalized_tags(),
                &created_by,
            ],
        )
        .await?;
    let saved = row_to_relationship(&row)?;
    info!(
        organization_id,
        worker_id = saved.worker_id,
        relationship = saved.relationship_type.as_ref(),
        "worker relationship saved"
    );
    Ok(saved)
}

#[instrument(skip(pool))]
pub async fn get_relationship(
    pool: &PgPool,
    organization_id: i64,
    worker_id: i64,
) -> Result<Option<WorkerRelationship>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "SELECT {RELATIONSHIP_COLUMNS} FROM sb.worker_relationships
                 WHERE organization_id = $1 AND worker_id = $2"
            ),
            &[&organization_id, &worker_id],
        )
        .await?;
    row.as_ref().map(row_to_relationship).transpose()
}

#[instrument(skip(pool, filter))]
pub async fn list_relationships(
    pool: &PgPool,
    organization_id: i64,
    filter: &RelationshipFilter,
    page: Pagination,
) -> Result<ListResponse<WorkerRelationship>> {
    let client = pool.get().await?;
    let kind = filter.relationship_type.map(|t| t.as_ref().to_string());
    let rows = client
        .query(
            &format!(
                "SELECT {RELATIONSHIP_COLUMNS} FROM sb.worker_relationships
                 WHERE organization_id = $1 AND ($2::TEXT IS NULL OR relationship_type = $2)
                 ORDER BY updated_at DESC, id DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&organization_id, &kind, &page.probe_limit(), &page.offset],
        )
        .await?;
    let items = rows.iter().map(row_to_relationship).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

#[instrument(skip(pool))]
pub async fn delete_relationship(pool: &PgPool, organization_id: i64, worker_id: i64) -> Result<()> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            "DELETE FROM sb.worker_relationships WHERE organization_id = $1 AND worker_id = $2",
            &[&organization_id, &worker_id],
        )
        .await?;
    if deleted == 0 {
        return Err(RelationshipStorageError::NotFound(worker_id));
    }
    info!(organization_id, worker_id, "worker relationship removed");
    Ok(())
}
