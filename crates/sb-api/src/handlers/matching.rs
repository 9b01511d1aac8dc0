use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sb_common::api::matching::{CandidateView, EligibleShiftQuery, EligibleShiftView};
use sb_common::db::{eligible_shifts_for_worker, find_candidates, OwnedResource};
use sb_common::model::UserRole;
use sb_common::schedule::eligibility::EligibilityPolicy;

use super::access::require_resource_member;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct CandidateQuery {
    pub limit: Option<usize>,
}

/// Caller-supplied limits are capped at the configured maximum.
fn candidate_policy(base: &EligibilityPolicy, query: &CandidateQuery) -> Result<EligibilityPolicy, ApiError> {
    let max_candidates = match query.limit {
        Some(0) => return Err(ApiError::BadRequest("limit must be at least 1".into())),
        Some(limit) => limit.min(base.max_candidates),
        None => base.max_candidates,
    };
    Ok(EligibilityPolicy {
        max_candidates,
        ..*base
    })
}

pub async fn candidates(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(shift_id): Path<i64>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<CandidateView>>, ApiError> {
    let policy = candidate_policy(&state.config.candidate_policy, &query)?;
    require_resource_member(&state, &auth, OwnedResource::Shift(shift_id)).await?;
    let ranked = find_candidates(&state.pool, shift_id, &policy, state.config.clock.now()).await?;
    Ok(Json(ranked))
}

pub async fn eligible_shifts(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<EligibleShiftQuery>,
) -> Result<Json<Vec<EligibleShiftView>>, ApiError> {
    auth.require_role(&[UserRole::Worker])?;
    let worker_id = auth.user_id()?;
    let (from, to) = query.resolve(state.config.clock.today())?;
    let shifts = eligible_shifts_for_worker(
        &state.pool,
        worker_id,
        from,
        to,
        &state.config.apply_policy,
        state.config.clock.now(),
    )
    .await?;
    Ok(Json(shifts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_limit_is_capped_by_config() {
        let base = EligibilityPolicy {
            require_availability: true,
            max_candidates: 50,
        };
        let policy = candidate_policy(&base, &CandidateQuery { limit: Some(500) }).unwrap();
        assert_eq!(policy.max_candidates, 50);
        assert!(policy.require_availability);

        let policy = candidate_policy(&base, &CandidateQuery { limit: Some(5) }).unwrap();
        assert_eq!(policy.max_candidates, 5);

        assert!(candidate_policy(&base, &CandidateQuery { limit: Some(0) }).is_err());
    }
}
