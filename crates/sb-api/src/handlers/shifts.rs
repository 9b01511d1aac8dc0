use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sb_common::api::applications::{ApplicationFilter, ApplicationView};
use sb_common::api::shifts::{ExpansionOutcome, NewShiftTemplate, ShiftDemandUpdate};
use sb_common::api::{ListResponse, Pagination};
use sb_common::db::{
    create_template, delete_shift_date, expand_template, list_shift_applications, list_templates,
    update_shift_demand, OwnedResource,
};
use sb_common::model::{ShiftDate, ShiftTemplateRecord};
use sb_common::schedule::expander::ExpansionRequest;

use super::access::require_resource_member;
use super::pagination::validate_pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

pub async fn create_one_template(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(job_id): Path<i64>,
    Json(body): Json<NewShiftTemplate>,
) -> Result<(StatusCode, Json<ShiftTemplateRecord>), ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Job(job_id)).await?;
    let template = body.validate()?;
    let record = create_template(&state.pool, job_id, &template).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_job_templates(
    State(state): State<SharedState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Vec<ShiftTemplateRecord>>, ApiError> {
    Ok(Json(list_templates(&state.pool, job_id).await?))
}

/// Dates the template already has come back under `skipped` rather than failing.
pub async fn expand(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(template_id): Path<i64>,
    Json(request): Json<ExpansionRequest>,
) -> Result<(StatusCode, Json<ExpansionOutcome>), ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Template(template_id)).await?;
    let today = state.config.clock.today();
    let outcome = expand_template(&state.pool, template_id, &request, today).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn update_demand(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(shift_id): Path<i64>,
    Json(update): Json<ShiftDemandUpdate>,
) -> Result<Json<ShiftDate>, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Shift(shift_id)).await?;
    update.validate()?;
    Ok(Json(update_shift_demand(&state.pool, shift_id, &update).await?))
}

pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(shift_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Shift(shift_id)).await?;
    delete_shift_date(&state.pool, shift_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_applications(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(shift_id): Path<i64>,
    Query(filter): Query<ApplicationFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<ApplicationView>>, ApiError> {
    require_resource_member(&state, &auth, OwnedResource::Shift(shift_id)).await?;
    let page = validate_pagination(page)?;
    Ok(Json(list_shift_applications(&state.pool, shift_id, &filter, page).await?))
}
