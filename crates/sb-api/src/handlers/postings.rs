use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sb_common::api::postings::{NewPosting, PostingDetail, PostingFilter, PostingUpdate};
use sb_common::api::shifts::ShiftDateView;
use sb_common::api::{ListResponse, Pagination};
use sb_common::db::{
    close_posting, create_posting, get_posting, list_posting_shifts, list_published_postings,
    publish_posting, update_posting, OwnedResource,
};
use sb_common::model::{JobPosting, JobPostingStatus, UserRole};

use super::access::{require_member, require_resource_member};
use super::pagination::validate_pagination;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreatePostingBody {
    pub organization_id: i64,
    #[serde(flatten)]
    pub posting: NewPosting,
}

pub async fn list_published(
    State(state): State<SharedState>,
    Query(filter): Query<PostingFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<JobPosting>>, ApiError> {
    filter.validate()?;
    let page = validate_pagination(page)?;
    Ok(Json(list_published_postings(&state.pool, &filter, page).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(body): Json<CreatePostingBody>,
) -> Result<(StatusCode, Json<PostingDetail>), ApiError> {
    auth.require_role(&[UserRole::Employer])?;
    let poster_id = auth.user_id()?;
    require_member(&state, &auth, body.organization_id).await?;
    body.posting.validate()?;
    let detail = create_posting(&state.pool, body.organization_id, poster_id, &body.posting).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Drafts and closed postings are only visible to the organization; everyone
/// else gets a 404 so their existence does not leak.
pub async fn get_one(
    State(state): State<SharedState>,
    auth: MaybeAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PostingDetail>, ApiError> {
    let not_found = || ApiError::NotFound(format!("posting {id} not found"));
    let detail = get_posting(&state.pool, id).await?.ok_or_else(not_found)?;
    if detail.posting.status != JobPostingStatus::Published {
        let auth = auth.0.ok_or_else(not_found)?;
        require_member(&state, &auth, detail.posting.organization_id)
            .await
            .map_err(|_| not_found())?;
    }
    Ok(Json(detail))
}

pub async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<PostingUpdate>,
) -> Result<Json<JobPosting>, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Posting(id)).await?;
    update.validate()?;
    Ok(Json(update_posting(&state.pool, id, &update).await?))
}

pub async fn publish(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<JobPosting>, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Posting(id)).await?;
    let today = state.config.clock.today();
    Ok(Json(publish_posting(&state.pool, id, today).await?))
}

pub async fn close(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<JobPosting>, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Posting(id)).await?;
    let today = state.config.clock.today();
    Ok(Json(close_posting(&state.pool, id, today).await?))
}

pub async fn list_shifts(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ShiftDateView>>, ApiError> {
    Ok(Json(list_posting_shifts(&state.pool, id).await?))
}
