//! Read-side matching: candidate lists for employers and open shifts for
//! workers, both driven by the eligibility checks in `schedule`.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, instrument};

use crate::api::matching::{CandidateView, EligibleShiftView};
use crate::db::snapshots::{
    accepted_intervals, load_candidate_pool, load_open_shifts, load_shift, load_worker,
    snapshot_from_profile, worker_relationships, SnapshotError,
};
use crate::db::{db_error, PgPool};
use crate::schedule::eligibility::{eligible_shifts, rank_candidates, EligibilityPolicy};

/// Upper bound on workers pulled from the database before ranking.
const CANDIDATE_POOL_LIMIT: i64 = 2000;
/// Upper bound on open shifts scanned for one worker.
const OPEN_SHIFT_LIMIT: i64 = 1000;

db_error!(MatchingStorageError {
    #[error("shift not found: {0}")]
    ShiftNotFound(i64),
    #[error("worker profile not found: {0}")]
    WorkerNotFound(i64),
    #[error("unexpected matching row: {0}")]
    Mapping(String),
});

impl From<SnapshotError> for MatchingStorageError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Postgres(e) => Self::Postgres(e),
            SnapshotError::Mapping(m) => Self::Mapping(m),
        }
    }
}

type Result<T> = std::result::Result<T, MatchingStorageError>;

/// Ranked workers an employer can offer the shift to.
#[instrument(skip(pool, policy))]
pub async fn find_candidates(
    pool: &PgPool,
    shift_date_id: i64,
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> Result<Vec<CandidateView>> {
    let client = pool.get().await?;
    let shift = load_shift(&client, shift_date_id)
        .await?
        .ok_or(MatchingStorageError::ShiftNotFound(shift_date_id))?;
    let organization_id = shift.snapshot.organization_id;

    let rows = load_candidate_pool(&client, &shift.snapshot, CANDIDATE_POOL_LIMIT).await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.profile.user_id).collect();
    let mut booked = accepted_intervals(&client, &ids, shift.shift_date, shift.shift_date).await?;

    let workers: Vec<_> = rows
        .iter()
        .map(|row| {
            let relationships = row
                .relationship
                .map(|tag| HashMap::from([(organization_id, tag)]))
                .unwrap_or_default();
            let accepted = booked.remove(&row.profile.user_id).unwrap_or_default();
            snapshot_from_profile(&row.profile, relationships, accepted)
        })
        .collect();
    let by_id: HashMap<i64, _> = rows.iter().map(|r| (r.profile.user_id, r)).collect();

    let ranked = rank_candidates(&shift.snapshot, &workers, policy, now);
    debug!(
        shift_date_id,
        pool = rows.len(),
        ranked = ranked.len(),
        "candidates ranked"
    );

    Ok(ranked
        .into_iter()
        .filter_map(|candidate| {
            let row = by_id.get(&candidate.worker_id)?;
            Some(CandidateView {
                worker_id: candidate.worker_id,
                name: row.name.clone(),
                relationship: candidate.relationship,
                reliability_score: candidate.reliability_score,
                total_jobs_completed: row.profile.total_jobs_completed,
                needs_review: candidate.result.needs_review,
                review_reasons: candidate.result.review_reasons(),
                has_applied: row.has_applied,
            })
        })
        .collect())
}

/// Open shifts dated `from..=to` the worker could apply to, soonest first.
/// Shifts the worker already applied to or was rejected from are left out.
#[instrument(skip(pool, policy))]
pub async fn eligible_shifts_for_worker(
    pool: &PgPool,
    worker_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> Result<Vec<EligibleShiftView>> {
    let client = pool.get().await?;
    let worker = load_worker(&client, worker_id, false)
        .await?
        .ok_or(MatchingStorageError::WorkerNotFound(worker_id))?;
    let relationships = worker_relationships(&client, worker_id).await?;
    let booked = accepted_intervals(&client, &[worker_id], from, to)
        .await?
        .remove(&worker_id)
        .unwrap_or_default();
    let snapshot = snapshot_from_profile(&worker.profile, relationships, booked);

    let seen: HashSet<i64> = client
        .query(
            "SELECT shift_date_id FROM sb.applications
             WHERE worker_id = $1 AND status IN ('pending', 'accepted', 'rejected')",
            &[&worker_id],
        )
        .await?
        .iter()
        .map(|r| r.try_get("shift_date_id"))
        .collect::<std::result::Result<_, _>>()?;

    let contexts: HashMap<i64, _> = load_open_shifts(&client, from, to, OPEN_SHIFT_LIMIT)
        .await?
        .into_iter()
        .filter(|ctx| !seen.contains(&ctx.snapshot.shift_date_id))
        .map(|ctx| (ctx.snapshot.shift_date_id, ctx))
        .collect();
    let shifts: Vec<_> = contexts.values().map(|ctx| ctx.snapshot.clone()).collect();

    Ok(eligible_shifts(&snapshot, &shifts, policy, now)
        .into_iter()
        .filter_map(|eligible| {
            let ctx = contexts.get(&eligible.shift_date_id)?;
            Some(EligibleShiftView {
                shift_date_id: eligible.shift_date_id,
                posting_id: ctx.snapshot.posting_id,
                posting_title: ctx.posting_title.clone(),
                organization_id: ctx.snapshot.organization_id,
                position_id: ctx.snapshot.position_id,
                shift_date: ctx.shift_date,
                interval: eligible.interval,
                salary: ctx.snapshot.salary,
                remaining: ctx.snapshot.remaining(),
                needs_review: eligible.result.needs_review,
                review_reasons: eligible.result.review_reasons(),
            })
        })
        .collect())
}
