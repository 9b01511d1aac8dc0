use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sb_common::api::users::{NewUser, SetActiveRequest, UserProfileUpdate};
use sb_common::db::{create_user, get_user, set_user_active, update_user_profile};
use sb_common::model::User;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

pub async fn get_me(State(state): State<SharedState>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    let user_id = auth.user_id()?;
    let user = get_user(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(update): Json<UserProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    update.validate()?;
    let user = update_user_profile(&state.pool, auth.user_id()?, &update).await?;
    Ok(Json(user))
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    auth.require_admin()?;
    user.validate()?;
    let created = create_user(&state.pool, &user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn set_active(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_admin()?;
    let user = set_user_active(&state.pool, user_id, request.is_active).await?;
    Ok(Json(user))
}
