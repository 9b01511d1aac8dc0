use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sb_common::api::relationships::{RelationshipFilter, RelationshipUpsert};
use sb_common::api::{ListResponse, Pagination};
use sb_common::db::{delete_relationship, get_relationship, list_relationships, upsert_relationship};
use sb_common::model::WorkerRelationship;

use super::access::require_member;
use super::pagination::validate_pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

pub async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(org_id): Path<i64>,
    Query(filter): Query<RelationshipFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<WorkerRelationship>>, ApiError> {
    require_member(&state, &auth, org_id).await?;
    let page = validate_pagination(page)?;
    Ok(Json(list_relationships(&state.pool, org_id, &filter, page).await?))
}

pub async fn upsert(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(org_id): Path<i64>,
    Json(upsert): Json<RelationshipUpsert>,
) -> Result<Json<WorkerRelationship>, ApiError> {
    require_member(&state, &auth, org_id).await?;
    upsert.validate()?;
    Ok(Json(upsert_relationship(&state.pool, org_id, auth.user_id, &upsert).await?))
}

pub async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((org_id, worker_id)): Path<(i64, i64)>,
) -> Result<Json<WorkerRelationship>, ApiError> {
    require_member(&state, &auth, org_id).await?;
    let relationship = get_relationship(&state.pool, org_id, worker_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no relationship with worker {worker_id}")))?;
    Ok(Json(relationship))
}

pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((org_id, worker_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    require_member(&state, &auth, org_id).await?;
    delete_relationship(&state.pool, org_id, worker_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
