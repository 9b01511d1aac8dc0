//! Organization-scoped authorization.

use sb_common::db::{member_role, organization_of, OwnedResource};
use sb_common::model::MemberRole;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

async fn role_in(state: &AppState, auth: &AuthUser, organization_id: i64) -> Result<Option<MemberRole>, ApiError> {
    let user_id = auth.user_id()?;
    Ok(member_role(&state.pool, organization_id, user_id).await?)
}

/// Admins pass; everyone else must belong to the organization.
pub async fn require_member(state: &AppState, auth: &AuthUser, organization_id: i64) -> Result<(), ApiError> {
    if auth.is_admin() {
        return Ok(());
    }
    match role_in(state, auth, organization_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::Forbidden(format!(
            "not a member of organization {organization_id}"
        ))),
    }
}

pub async fn require_org_admin(state: &AppState, auth: &AuthUser, organization_id: i64) -> Result<(), ApiError> {
    if auth.is_admin() {
        return Ok(());
    }
    match role_in(state, auth, organization_id).await? {
        Some(MemberRole::Admin) => Ok(()),
        _ => Err(ApiError::Forbidden(format!(
            "organization {organization_id} requires an admin member"
        ))),
    }
}

/// Resolves the organization owning `resource` and checks membership in it.
pub async fn require_resource_member(
    state: &AppState,
    auth: &AuthUser,
    resource: OwnedResource,
) -> Result<i64, ApiError> {
    let organization_id = organization_of(&state.pool, resource).await?;
    require_member(state, auth, organization_id).await?;
    Ok(organization_id)
}
