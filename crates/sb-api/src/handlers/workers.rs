use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sb_common::api::applications::{ApplicationFilter, ApplicationView};
use sb_common::api::workers::{
    AvailabilityReplace, IdentityReview, IdentitySubmission, WorkerPreferencesUpdate,
    WorkerProfileInput,
};
use sb_common::api::{ListResponse, Pagination};
use sb_common::db::{
    create_worker_profile, get_worker_profile, list_worker_applications, replace_availability,
    review_identity, set_worker_status, submit_identity, update_worker_preferences,
};
use sb_common::model::{ProfileStatus, UserRole, WorkerProfile};

use super::pagination::validate_pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ProfileStatus,
}

fn worker_id(auth: &AuthUser) -> Result<i64, ApiError> {
    auth.require_role(&[UserRole::Worker])?;
    auth.user_id()
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(input): Json<WorkerProfileInput>,
) -> Result<(StatusCode, Json<WorkerProfile>), ApiError> {
    let user_id = worker_id(&auth)?;
    input.validate()?;
    let profile = create_worker_profile(&state.pool, user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_me(State(state): State<SharedState>, auth: AuthUser) -> Result<Json<WorkerProfile>, ApiError> {
    let user_id = worker_id(&auth)?;
    let profile = get_worker_profile(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("worker profile not found".into()))?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(update): Json<WorkerPreferencesUpdate>,
) -> Result<Json<WorkerProfile>, ApiError> {
    let user_id = worker_id(&auth)?;
    update.validate()?;
    Ok(Json(update_worker_preferences(&state.pool, user_id, &update).await?))
}

pub async fn put_availability(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(body): Json<AvailabilityReplace>,
) -> Result<Json<WorkerProfile>, ApiError> {
    let user_id = worker_id(&auth)?;
    Ok(Json(replace_availability(&state.pool, user_id, &body.availability).await?))
}

pub async fn post_identity(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(submission): Json<IdentitySubmission>,
) -> Result<Json<WorkerProfile>, ApiError> {
    let user_id = worker_id(&auth)?;
    submission.validate()?;
    Ok(Json(submit_identity(&state.pool, user_id, &submission).await?))
}

pub async fn review(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(review): Json<IdentityReview>,
) -> Result<Json<WorkerProfile>, ApiError> {
    auth.require_admin()?;
    review.validate()?;
    Ok(Json(review_identity(&state.pool, user_id, &review).await?))
}

/// Admin moderation, the only path to `SUSPENDED`.
pub async fn set_status(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<WorkerProfile>, ApiError> {
    auth.require_admin()?;
    Ok(Json(set_worker_status(&state.pool, user_id, update.status).await?))
}

pub async fn my_applications(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(filter): Query<ApplicationFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<ApplicationView>>, ApiError> {
    let user_id = worker_id(&auth)?;
    let page = validate_pagination(page)?;
    Ok(Json(list_worker_applications(&state.pool, user_id, &filter, page).await?))
}
