//! Application lifecycle endpoints.
//!
//! Employer actions resolve the owning organization from the application and
//! require membership. Cancel is shared: a worker cancels their own
//! application, anyone else cancels on behalf of the organization.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sb_common::api::applications::{ApplicationView, ApplyRequest};
use sb_common::db::{apply_to_shift, decide_application, get_application, ActorRef, OwnedResource};
use sb_common::model::{Application, UserRole};
use sb_common::schedule::application::{Actor, ApplicationAction};

use super::access::{require_member, require_resource_member};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

pub async fn apply(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(shift_id): Path<i64>,
    Json(request): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    auth.require_role(&[UserRole::Worker])?;
    let worker_id = auth.user_id()?;
    request.validate()?;
    let application = apply_to_shift(
        &state.pool,
        worker_id,
        shift_id,
        &request,
        &state.config.apply_policy,
        state.config.clock.now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// Visible to the applicant and to members of the hiring organization.
pub async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApplicationView>, ApiError> {
    let not_found = || ApiError::NotFound(format!("application {id} not found"));
    let view = get_application(&state.pool, id).await?.ok_or_else(not_found)?;
    if auth.user_id == Some(view.application.worker_id) {
        return Ok(Json(view));
    }
    require_member(&state, &auth, view.organization_id)
        .await
        .map_err(|_| not_found())?;
    Ok(Json(view))
}

async fn decide_as_employer(
    state: &SharedState,
    auth: &AuthUser,
    id: i64,
    action: ApplicationAction,
) -> Result<Json<Application>, ApiError> {
    require_resource_member(state, auth, OwnedResource::Application(id)).await?;
    let actor = ActorRef {
        user_id: auth.user_id,
        actor: Actor::Employer,
    };
    let application = decide_application(&state.pool, id, action, actor, state.config.clock.now()).await?;
    Ok(Json(application))
}

pub async fn accept(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    decide_as_employer(&state, &auth, id, ApplicationAction::Accept).await
}

pub async fn reject(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    decide_as_employer(&state, &auth, id, ApplicationAction::Reject).await
}

pub async fn complete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    decide_as_employer(&state, &auth, id, ApplicationAction::Complete).await
}

pub async fn no_show(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    decide_as_employer(&state, &auth, id, ApplicationAction::NoShow).await
}

pub async fn cancel(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    if auth.role != UserRole::Worker {
        return decide_as_employer(&state, &auth, id, ApplicationAction::Cancel).await;
    }
    let actor = ActorRef {
        user_id: Some(auth.user_id()?),
        actor: Actor::Worker,
    };
    let application =
        decide_application(&state.pool, id, ApplicationAction::Cancel, actor, state.config.clock.now()).await?;
    Ok(Json(application))
}
