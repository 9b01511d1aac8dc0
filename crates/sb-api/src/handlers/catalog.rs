use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sb_common::api::catalog::{
    IndustryUpdate, NewIndustry, NewPosition, PositionFilter, PositionUpdate,
};
use sb_common::db::{
    create_industry, create_position, delete_industry, get_industry, get_position,
    list_industries as fetch_industries, list_positions as fetch_positions, update_industry,
    update_position,
};
use sb_common::model::{Industry, Position};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::SharedState;

pub async fn list_industries(State(state): State<SharedState>) -> Result<Json<Vec<Industry>>, ApiError> {
    Ok(Json(fetch_industries(&state.pool, false).await?))
}

pub async fn list_all_industries(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<Vec<Industry>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(fetch_industries(&state.pool, true).await?))
}

/// Inactive industries are only visible to admins.
pub async fn get_one_industry(
    State(state): State<SharedState>,
    auth: MaybeAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Industry>, ApiError> {
    let industry = get_industry(&state.pool, id, auth.is_admin())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("industry {id} not found")))?;
    Ok(Json(industry))
}

pub async fn create_one_industry(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(industry): Json<NewIndustry>,
) -> Result<(StatusCode, Json<Industry>), ApiError> {
    auth.require_admin()?;
    industry.validate()?;
    let created = create_industry(&state.pool, &industry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_one_industry(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<IndustryUpdate>,
) -> Result<Json<Industry>, ApiError> {
    auth.require_admin()?;
    update.validate()?;
    Ok(Json(update_industry(&state.pool, id, &update).await?))
}

pub async fn delete_one_industry(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    delete_industry(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_positions(
    State(state): State<SharedState>,
    Query(filter): Query<PositionFilter>,
) -> Result<Json<Vec<Position>>, ApiError> {
    Ok(Json(fetch_positions(&state.pool, filter.industry_id, false).await?))
}

pub async fn get_one_position(
    State(state): State<SharedState>,
    auth: MaybeAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Position>, ApiError> {
    let position = get_position(&state.pool, id, auth.is_admin())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("position {id} not found")))?;
    Ok(Json(position))
}

pub async fn create_one_position(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(position): Json<NewPosition>,
) -> Result<(StatusCode, Json<Position>), ApiError> {
    auth.require_admin()?;
    position.validate()?;
    let created = create_position(&state.pool, &position).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_one_position(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<PositionUpdate>,
) -> Result<Json<Position>, ApiError> {
    auth.require_admin()?;
    update.validate()?;
    Ok(Json(update_position(&state.pool, id, &update).await?))
}
