//! Loads the database state the eligibility checks and the application state
//! machine run against.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use deadpool_postgres::GenericClient;
use thiserror::Error;
use tokio_postgres::{Error as PgError, Row};

use crate::db::util::{parse_enum, parse_enum_opt, TimedClientExt};
use crate::db::workers::{availability_index, row_to_worker};
use crate::model::{RelationshipType, WorkerProfile};
use crate::schedule::eligibility::{ShiftSnapshot, WorkerSnapshot};
use crate::schedule::expander::ShiftTemplate;
use crate::schedule::time::ShiftInterval;

#[derive(Debug, Error)]
pub(crate) enum SnapshotError {
    #[error(transparent)]
    Postgres(#[from] PgError),
    #[error("{0}")]
    Mapping(String),
}

/// A shift instance with the posting data callers render alongside it.
#[derive(Debug, Clone)]
pub(crate) struct ShiftContext {
    pub snapshot: ShiftSnapshot,
    pub shift_date: NaiveDate,
    pub template: ShiftTemplate,
    pub posting_title: String,
}

const SHIFT_CONTEXT_SELECT: &str = "SELECT
        sd.id AS shift_date_id, sd.shift_date, sd.quantity, sd.gender_requirement,
        sd.salary_override, t.start_hour, t.end_hour, t.salary, j.position_id,
        p.id AS posting_id, p.organization_id, p.status AS posting_status,
        p.province_code, p.title AS posting_title,
        (SELECT COUNT(*) FROM sb.applications a
          WHERE a.shift_date_id = sd.id AND a.status = 'accepted')::INT AS accepted
     FROM sb.shift_dates sd
     JOIN sb.shift_templates t ON t.id = sd.template_id
     JOIN sb.jobs j ON j.id = t.job_id
     JOIN sb.job_postings p ON p.id = j.posting_id";

pub(crate) fn interval_for(date: NaiveDate, start_hour: i16, end_hour: i16) -> ShiftInterval {
    ShiftTemplate { start_hour, end_hour, salary: 1 }.instance_interval(date)
}

fn row_to_shift_context(row: &Row) -> Result<ShiftContext, SnapshotError> {
    let shift_date: NaiveDate = row.try_get("shift_date")?;
    let template = ShiftTemplate {
        start_hour: row.try_get("start_hour")?,
        end_hour: row.try_get("end_hour")?,
        salary: row.try_get("salary")?,
    };
    let salary_override: Option<i64> = row.try_get("salary_override")?;

    let snapshot = ShiftSnapshot {
        shift_date_id: row.try_get("shift_date_id")?,
        posting_id: row.try_get("posting_id")?,
        organization_id: row.try_get("organization_id")?,
        posting_status: parse_enum(row, "posting_status").map_err(SnapshotError::Mapping)?,
        position_id: row.try_get("position_id")?,
        province_code: row.try_get("province_code")?,
        interval: template.instance_interval(shift_date),
        quantity: row.try_get("quantity")?,
        accepted: row.try_get("accepted")?,
        gender_requirement: parse_enum(row, "gender_requirement").map_err(SnapshotError::Mapping)?,
        salary: salary_override.unwrap_or(template.salary),
    };
    Ok(ShiftContext {
        snapshot,
        shift_date,
        template,
        posting_title: row.try_get("posting_title")?,
    })
}

pub(crate) async fn load_shift(
    client: &impl GenericClient,
    shift_date_id: i64,
) -> Result<Option<ShiftContext>, SnapshotError> {
    let row = client
        .timed_query_opt(
            &format!("{SHIFT_CONTEXT_SELECT} WHERE sd.id = $1"),
            &[&shift_date_id],
            "load_shift",
        )
        .await?;
    row.as_ref().map(row_to_shift_context).transpose()
}

/// Shifts of published postings dated within `from..=to`.
pub(crate) async fn load_open_shifts(
    client: &impl GenericClient,
    from: NaiveDate,
    to: NaiveDate,
    limit: i64,
) -> Result<Vec<ShiftContext>, SnapshotError> {
    let rows = client
        .timed_query(
            &format!(
                "{SHIFT_CONTEXT_SELECT}
                 WHERE p.status = 'PUBLISHED' AND sd.shift_date BETWEEN $1 AND $2
                 ORDER BY sd.shift_date, t.start_hour, sd.id
                 LIMIT $3"
            ),
            &[&from, &to, &limit],
            "load_open_shifts",
        )
        .await?;
    rows.iter().map(row_to_shift_context).collect()
}

/// Takes the row lock that serializes capacity decisions on one shift.
/// Returns `false` when the shift does not exist.
pub(crate) async fn lock_shift(client: &impl GenericClient, shift_date_id: i64) -> Result<bool, PgError> {
    Ok(client
        .query_opt(
            "SELECT id FROM sb.shift_dates WHERE id = $1 FOR UPDATE",
            &[&shift_date_id],
        )
        .await?
        .is_some())
}

/// Counted in its own statement so it sees every commit that happened
/// before the caller's lock was granted.
pub(crate) async fn count_accepted(client: &impl GenericClient, shift_date_id: i64) -> Result<i32, PgError> {
    let row = client
        .query_one(
            "SELECT COUNT(*)::INT AS accepted FROM sb.applications
             WHERE shift_date_id = $1 AND status = 'accepted'",
            &[&shift_date_id],
        )
        .await?;
    row.try_get("accepted")
}

/// Accepted shift intervals per worker for shifts dated within
/// `from - 1 ..= to + 1`, so overnight shifts on the edges are included.
pub(crate) async fn accepted_intervals(
    client: &impl GenericClient,
    worker_ids: &[i64],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashMap<i64, Vec<(i64, ShiftInterval)>>, PgError> {
    let mut by_worker: HashMap<i64, Vec<(i64, ShiftInterval)>> = HashMap::new();
    if worker_ids.is_empty() {
        return Ok(by_worker);
    }
    let rows = client
        .timed_query(
            "SELECT a.worker_id, sd.id AS shift_date_id, sd.shift_date, t.start_hour, t.end_hour
             FROM sb.applications a
             JOIN sb.shift_dates sd ON sd.id = a.shift_date_id
             JOIN sb.shift_templates t ON t.id = sd.template_id
             WHERE a.status = 'accepted'
               AND a.worker_id = ANY($1)
               AND sd.shift_date BETWEEN $2 AND $3",
            &[&worker_ids, &(from - Duration::days(1)), &(to + Duration::days(1))],
            "accepted_intervals",
        )
        .await?;
    for row in rows {
        let worker_id: i64 = row.try_get("worker_id")?;
        let interval = interval_for(
            row.try_get("shift_date")?,
            row.try_get("start_hour")?,
            row.try_get("end_hour")?,
        );
        by_worker
            .entry(worker_id)
            .or_default()
            .push((row.try_get("shift_date_id")?, interval));
    }
    Ok(by_worker)
}

pub(crate) async fn worker_relationships(
    client: &impl GenericClient,
    worker_id: i64,
) -> Result<HashMap<i64, RelationshipType>, SnapshotError> {
    let rows = client
        .query(
            "SELECT organization_id, relationship_type FROM sb.worker_relationships
             WHERE worker_id = $1",
            &[&worker_id],
        )
        .await?;
    rows.iter()
        .map(|row| {
            let org: i64 = row.try_get("organization_id")?;
            let tag = parse_enum(row, "relationship_type").map_err(SnapshotError::Mapping)?;
            Ok((org, tag))
        })
        .collect()
}

pub(crate) fn snapshot_from_profile(
    profile: &WorkerProfile,
    relationships: HashMap<i64, RelationshipType>,
    accepted_shifts: Vec<(i64, ShiftInterval)>,
) -> WorkerSnapshot {
    WorkerSnapshot {
        worker_id: profile.user_id,
        status: profile.status,
        gender: profile.gender,
        preferred_positions: profile.preferred_positions.clone(),
        preferred_locations: profile.preferred_locations.clone(),
        expected_salary: profile.expected_salary,
        reliability_score: profile.reliability_score,
        availability: availability_index(profile),
        relationships,
        accepted_shifts,
    }
}

/// Worker profile plus the account state admission needs.
pub(crate) struct LoadedWorker {
    pub profile: WorkerProfile,
    pub name: String,
    pub user_active: bool,
}

pub(crate) async fn load_worker(
    client: &impl GenericClient,
    worker_id: i64,
    for_update: bool,
) -> Result<Option<LoadedWorker>, SnapshotError> {
    let lock = if for_update { "FOR UPDATE OF w" } else { "" };
    let row = client
        .query_opt(
            &format!(
                "SELECT w.*, u.name AS worker_name, u.is_active AS user_active
                 FROM sb.workers w
                 JOIN sb.users u ON u.id = w.user_id
                 WHERE w.user_id = $1
                 {lock}"
            ),
            &[&worker_id],
        )
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let profile = row_to_worker(&row).map_err(|e| SnapshotError::Mapping(e.to_string()))?;
    Ok(Some(LoadedWorker {
        profile,
        name: row.try_get("worker_name")?,
        user_active: row.try_get("user_active")?,
    }))
}

pub(crate) struct CandidateRow {
    pub profile: WorkerProfile,
    pub name: String,
    pub relationship: Option<RelationshipType>,
    pub has_applied: bool,
}

/// Candidate pool for one shift: active, public workers not blocked by the
/// organization and not already rejected or accepted for this shift,
/// favorites and reliable workers first.
pub(crate) async fn load_candidate_pool(
    client: &impl GenericClient,
    shift: &ShiftSnapshot,
    limit: i64,
) -> Result<Vec<CandidateRow>, SnapshotError> {
    let rows = client
        .timed_query(
            "SELECT w.*, u.name AS worker_name, r.relationship_type,
                    EXISTS (
                        SELECT 1 FROM sb.applications a
                        WHERE a.worker_id = w.user_id AND a.shift_date_id = $3
                          AND a.status = 'pending'
                    ) AS has_applied
             FROM sb.workers w
             JOIN sb.users u ON u.id = w.user_id
             LEFT JOIN sb.worker_relationships r
               ON r.worker_id = w.user_id AND r.organization_id = $1
             WHERE u.is_active
               AND w.status = 'PUBLIC'
               AND (r.relationship_type IS NULL OR r.relationship_type <> 'BLOCKED')
               AND ($2 = 'ANY' OR w.gender IS NULL OR w.gender = $2)
               AND NOT EXISTS (
                   SELECT 1 FROM sb.applications a
                   WHERE a.worker_id = w.user_id AND a.shift_date_id = $3
                     AND a.status IN ('rejected', 'accepted')
               )
             ORDER BY (r.relationship_type = 'FAVORITE') IS TRUE DESC,
                      w.reliability_score DESC, w.user_id
             LIMIT $4",
            &[
                &shift.organization_id,
                &shift.gender_requirement.as_ref(),
                &shift.shift_date_id,
                &limit,
            ],
            "load_candidate_pool",
        )
        .await?;

    rows.iter()
        .map(|row| {
            let profile = row_to_worker(row).map_err(|e| SnapshotError::Mapping(e.to_string()))?;
            let relationship =
                parse_enum_opt(row, "relationship_type").map_err(SnapshotError::Mapping)?;
            Ok(CandidateRow {
                profile,
                name: row.try_get("worker_name")?,
                relationship,
                has_applied: row.try_get("has_applied")?,
            })
        })
        .collect()
}
