use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sb_common::api::organizations::{
    NewMember, NewOrganization, OrganizationFilter, OrganizationUpdate, VerificationReview,
    VerificationSubmission,
};
use sb_common::api::postings::OrganizationPostingFilter;
use sb_common::api::{ListResponse, Pagination};
use sb_common::db::{
    add_member, create_organization, delete_organization, get_organization,
    get_organization_by_slug, list_members as fetch_members, list_organization_postings,
    list_organizations, remove_member as drop_member, review_verification, submit_verification,
    update_organization,
};
use sb_common::model::{JobPosting, Organization, OrganizationMember, UserRole};

use super::access::{require_member, require_org_admin};
use super::pagination::validate_pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<OrganizationFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<Organization>>, ApiError> {
    let page = validate_pagination(page)?;
    Ok(Json(list_organizations(&state.pool, &filter, page).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(org): Json<NewOrganization>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    auth.require_role(&[UserRole::Employer])?;
    org.validate()?;
    let created = create_organization(&state.pool, auth.user_id()?, &org).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_one(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Organization>, ApiError> {
    let org = get_organization(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("organization {id} not found")))?;
    Ok(Json(org))
}

pub async fn get_by_slug(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>, ApiError> {
    let org = get_organization_by_slug(&state.pool, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("organization {slug} not found")))?;
    Ok(Json(org))
}

pub async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<OrganizationUpdate>,
) -> Result<Json<Organization>, ApiError> {
    require_member(&state, &auth, id).await?;
    update.validate()?;
    Ok(Json(update_organization(&state.pool, id, &update).await?))
}

/// Only the owner or a platform admin may delete an organization.
pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_admin() {
        let org = get_organization(&state.pool, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("organization {id} not found")))?;
        if Some(org.owner_id) != auth.user_id {
            return Err(ApiError::Forbidden("only the owner can delete an organization".into()));
        }
    }
    delete_organization(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_documents(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(submission): Json<VerificationSubmission>,
) -> Result<Json<Organization>, ApiError> {
    require_member(&state, &auth, id).await?;
    submission.validate()?;
    Ok(Json(submit_verification(&state.pool, id, &submission).await?))
}

pub async fn review(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(review): Json<VerificationReview>,
) -> Result<Json<Organization>, ApiError> {
    auth.require_admin()?;
    review.validate()?;
    Ok(Json(review_verification(&state.pool, id, &review).await?))
}

pub async fn list_members(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OrganizationMember>>, ApiError> {
    require_member(&state, &auth, id).await?;
    Ok(Json(fetch_members(&state.pool, id).await?))
}

pub async fn create_member(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(member): Json<NewMember>,
) -> Result<(StatusCode, Json<OrganizationMember>), ApiError> {
    require_org_admin(&state, &auth, id).await?;
    let added = add_member(&state.pool, id, &member).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn remove_member(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    require_org_admin(&state, &auth, id).await?;
    drop_member(&state.pool, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_postings(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Query(filter): Query<OrganizationPostingFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<ListResponse<JobPosting>>, ApiError> {
    require_member(&state, &auth, id).await?;
    let page = validate_pagination(page)?;
    Ok(Json(list_organization_postings(&state.pool, id, &filter, page).await?))
}
