use chrono::NaiveDateTime;
use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument, warn};

use crate::api::applications::{ApplicationFilter, ApplicationView, ApplyRequest};
use crate::api::{ListResponse, Pagination};
use crate::db::snapshots::{
    accepted_intervals, interval_for, load_shift, load_worker, lock_shift, snapshot_from_profile,
    worker_relationships, ShiftContext, SnapshotError,
};
use crate::db::util::{parse_enum, unique_violation, TimedClientExt};
use crate::db::{db_error, PgPool};
use crate::model::Application;
use crate::schedule::application::{
    admit, transition, Actor, AdmissionContext, AdmissionError, ApplicationAction,
    ApplicationStatus, ReliabilityDelta, ShiftCapacity, TransitionContext, TransitionError,
};
use crate::schedule::eligibility::{evaluate, EligibilityPolicy};

/// Who is acting on an application. `user_id` is `None` for service callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorRef {
    pub user_id: Option<i64>,
    pub actor: Actor,
}

db_error!(ApplicationStorageError {
    #[error("application not found: {0}")]
    NotFound(i64),
    #[error("shift not found: {0}")]
    ShiftNotFound(i64),
    #[error("worker profile not found: {0}")]
    WorkerNotFound(i64),
    #[error("{0}")]
    Admission(#[from] AdmissionError),
    #[error("{0}")]
    Transition(#[from] TransitionError),
    #[error("the worker is already booked on overlapping shift {shift_date_id}")]
    DoubleBooked { shift_date_id: i64 },
    #[error("unexpected application row: {0}")]
    Mapping(String),
});

impl From<SnapshotError> for ApplicationStorageError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Postgres(e) => Self::Postgres(e),
            SnapshotError::Mapping(m) => Self::Mapping(m),
        }
    }
}

type Result<T> = std::result::Result<T, ApplicationStorageError>;

const APPLICATION_COLUMNS: &str = "id, worker_id, shift_date_id, status, note, decided_by, \
     decided_at, created_at, updated_at";

const VIEW_SELECT: &str = "SELECT
        a.id, a.worker_id, a.shift_date_id, a.status, a.note, a.decided_by, a.decided_at,
        a.created_at, a.updated_at, u.name AS worker_name, p.id AS posting_id,
        p.title AS posting_title, p.organization_id, sd.shift_date, t.start_hour, t.end_hour
     FROM sb.applications a
     JOIN sb.users u ON u.id = a.worker_id
     JOIN sb.shift_dates sd ON sd.id = a.shift_date_id
     JOIN sb.shift_templates t ON t.id = sd.template_id
     JOIN sb.jobs j ON j.id = t.job_id
     JOIN sb.job_postings p ON p.id = j.posting_id";

fn row_to_application(row: &Row) -> Result<Application> {
    Ok(Application {
        id: row.try_get("id")?,
        worker_id: row.try_get("worker_id")?,
        shift_date_id: row.try_get("shift_date_id")?,
        status: parse_enum(row, "status").map_err(ApplicationStorageError::Mapping)?,
        note: row.try_get("note")?,
        decided_by: row.try_get("decided_by")?,
        decided_at: row.try_get("decided_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_view(row: &Row) -> Result<ApplicationView> {
    let shift_date = row.try_get("shift_date")?;
    Ok(ApplicationView {
        application: row_to_application(row)?,
        worker_name: row.try_get("worker_name")?,
        posting_id: row.try_get("posting_id")?,
        posting_title: row.try_get("posting_title")?,
        organization_id: row.try_get("organization_id")?,
        interval: interval_for(shift_date, row.try_get("start_hour")?, row.try_get("end_hour")?),
        shift_date,
    })
}

fn capacity_of(shift: &ShiftContext) -> ShiftCapacity {
    ShiftCapacity {
        quantity: shift.snapshot.quantity,
        accepted: shift.snapshot.accepted,
    }
}

/// Locks the shift row and reloads it so `accepted` reflects every commit
/// made before the lock was granted.
async fn locked_shift(client: &impl GenericClient, shift_date_id: i64) -> Result<ShiftContext> {
    if !lock_shift(client, shift_date_id).await? {
        return Err(ApplicationStorageError::ShiftNotFound(shift_date_id));
    }
    load_shift(client, shift_date_id)
        .await?
        .ok_or(ApplicationStorageError::ShiftNotFound(shift_date_id))
}

/// Creates a pending application after the admission rules and the
/// eligibility checks pass.
#[instrument(skip(pool, request, policy))]
pub async fn apply_to_shift(
    pool: &PgPool,
    worker_id: i64,
    shift_date_id: i64,
    request: &ApplyRequest,
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> Result<Application> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let shift = locked_shift(&tx, shift_date_id).await?;
    let worker = load_worker(&tx, worker_id, false)
        .await?
        .ok_or(ApplicationStorageError::WorkerNotFound(worker_id))?;
    let relationships = worker_relationships(&tx, worker_id).await?;

    let prior_statuses = tx
        .query(
            "SELECT status FROM sb.applications WHERE worker_id = $1 AND shift_date_id = $2",
            &[&worker_id, &shift_date_id],
        )
        .await?
        .iter()
        .map(|row| parse_enum::<ApplicationStatus>(row, "status"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ApplicationStorageError::Mapping)?;

    admit(&AdmissionContext {
        now,
        shift_start: shift.snapshot.interval.start,
        posting_status: shift.snapshot.posting_status,
        capacity: capacity_of(&shift),
        user_active: worker.user_active,
        profile_status: worker.profile.status,
        relationship: relationships.get(&shift.snapshot.organization_id).copied(),
        prior_statuses,
    })?;

    let booked = accepted_intervals(&tx, &[worker_id], shift.shift_date, shift.shift_date)
        .await?
        .remove(&worker_id)
        .unwrap_or_default();
    let snapshot = snapshot_from_profile(&worker.profile, relationships, booked);
    let result = evaluate(&shift.snapshot, &snapshot, policy, now);
    if result.is_knockout {
        return Err(AdmissionError::Ineligible(result.knockout_reasons()).into());
    }

    let row = tx
        .query_one(
            &format!(
                "INSERT INTO sb.applications (worker_id, shift_date_id, note)
                 VALUES ($1, $2, $3)
                 RETURNING {APPLICATION_COLUMNS}"
            ),
            &[&worker_id, &shift_date_id, &request.note],
        )
        .await
        .map_err(|err| match unique_violation(&err) {
            Some("uq_applications_active") => AdmissionError::AlreadyApplied.into(),
            _ => ApplicationStorageError::from(err),
        })?;
    let created = row_to_application(&row)?;

    tx.execute(
        "UPDATE sb.job_postings SET application_count = application_count + 1 WHERE id = $1",
        &[&shift.snapshot.posting_id],
    )
    .await?;
    tx.commit().await?;

    metrics::counter!("sb_applications_total", "action" => "apply").increment(1);
    info!(
        application_id = created.id,
        worker_id,
        shift_date_id,
        needs_review = result.needs_review,
        "application created"
    );
    Ok(created)
}

/// Applies `action` to an application.
///
/// The application row is locked first, then its shift row; accepting also
/// locks the worker profile so two overlapping accepts for the same worker
/// cannot both succeed.
#[instrument(skip(pool))]
pub async fn decide_application(
    pool: &PgPool,
    application_id: i64,
    action: ApplicationAction,
    actor: ActorRef,
    now: NaiveDateTime,
) -> Result<Application> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_opt(
            &format!("SELECT {APPLICATION_COLUMNS} FROM sb.applications WHERE id = $1 FOR UPDATE"),
            &[&application_id],
        )
        .await?
        .ok_or(ApplicationStorageError::NotFound(application_id))?;
    let application = row_to_application(&row)?;
    if actor.actor == Actor::Worker && actor.user_id != Some(application.worker_id) {
        return Err(ApplicationStorageError::NotFound(application_id));
    }

    let shift = locked_shift(&tx, application.shift_date_id).await?;
    let next = transition(
        application.status,
        action,
        actor.actor,
        &TransitionContext {
            now,
            shift_start: shift.snapshot.interval.start,
            capacity: capacity_of(&shift),
        },
    )?;

    if next == ApplicationStatus::Accepted {
        load_worker(&tx, application.worker_id, true)
            .await?
            .ok_or(ApplicationStorageError::WorkerNotFound(application.worker_id))?;
        let booked = accepted_intervals(&tx, &[application.worker_id], shift.shift_date, shift.shift_date)
            .await?
            .remove(&application.worker_id)
            .unwrap_or_default();
        if let Some((other, _)) = booked
            .iter()
            .find(|(id, interval)| *id != shift.snapshot.shift_date_id && interval.overlaps(&shift.snapshot.interval))
        {
            return Err(ApplicationStorageError::DoubleBooked { shift_date_id: *other });
        }
    }

    let decided_by = match actor.actor {
        Actor::Employer => actor.user_id,
        Actor::Worker => None,
    };
    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.applications SET
                    status = $2,
                    decided_by = COALESCE($3, decided_by),
                    decided_at = CASE WHEN $4 THEN NOW() ELSE decided_at END,
                    updated_at = NOW()
                 WHERE id = $1
                 RETURNING {APPLICATION_COLUMNS}"
            ),
            &[
                &application_id,
                &next.as_str(),
                &decided_by,
                &(actor.actor == Actor::Employer),
            ],
        )
        .await?;
    let updated = row_to_application(&row)?;

    if let Some(delta) = ReliabilityDelta::for_status(next) {
        let worker = load_worker(&tx, application.worker_id, true)
            .await?
            .ok_or(ApplicationStorageError::WorkerNotFound(application.worker_id))?;
        let score = delta.apply_to(worker.profile.reliability_score);
        tx.execute(
            "UPDATE sb.workers SET
                reliability_score = $2,
                total_jobs_completed = total_jobs_completed + $3,
                no_show_count = no_show_count + $4,
                updated_at = NOW()
             WHERE user_id = $1",
            &[&application.worker_id, &score, &delta.completed, &delta.no_shows],
        )
        .await?;
        if next == ApplicationStatus::NoShow {
            warn!(worker_id = application.worker_id, score, "worker marked as no-show");
        }
    }
    tx.commit().await?;

    metrics::counter!("sb_applications_total", "action" => action.as_str()).increment(1);
    info!(
        application_id,
        from = %application.status,
        to = %next,
        actor = %actor.actor,
        "application decided"
    );
    Ok(updated)
}

#[instrument(skip(pool))]
pub async fn get_application(pool: &PgPool, application_id: i64) -> Result<Option<ApplicationView>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(&format!("{VIEW_SELECT} WHERE a.id = $1"), &[&application_id])
        .await?;
    row.as_ref().map(row_to_view).transpose()
}

/// A worker's applications, latest shifts first.
#[instrument(skip(pool, filter))]
pub async fn list_worker_applications(
    pool: &PgPool,
    worker_id: i64,
    filter: &ApplicationFilter,
    page: Pagination,
) -> Result<ListResponse<ApplicationView>> {
    let client = pool.get().await?;
    let status = filter.status.map(|s| s.as_str());
    let rows = client
        .timed_query(
            &format!(
                "{VIEW_SELECT}
                 WHERE a.worker_id = $1 AND ($2::TEXT IS NULL OR a.status = $2)
                 ORDER BY sd.shift_date DESC, t.start_hour DESC, a.id DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&worker_id, &status, &page.probe_limit(), &page.offset],
            "list_worker_applications",
        )
        .await?;
    let items = rows.iter().map(row_to_view).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

/// Applications for one shift in the order they arrived.
#[instrument(skip(pool, filter))]
pub async fn list_shift_applications(
    pool: &PgPool,
    shift_date_id: i64,
    filter: &ApplicationFilter,
    page: Pagination,
) -> Result<ListResponse<ApplicationView>> {
    let client = pool.get().await?;
    let status = filter.status.map(|s| s.as_str());
    let rows = client
        .timed_query(
            &format!(
                "{VIEW_SELECT}
                 WHERE a.shift_date_id = $1 AND ($2::TEXT IS NULL OR a.status = $2)
                 ORDER BY a.created_at, a.id
                 LIMIT $3 OFFSET $4"
            ),
            &[&shift_date_id, &status, &page.probe_limit(), &page.offset],
            "list_shift_applications",
        )
        .await?;
    let items = rows.iter().map(row_to_view).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_refusals_keep_their_message() {
        let blocked = ApplicationStorageError::from(AdmissionError::Blocked);
        assert_eq!(blocked.to_string(), AdmissionError::Blocked.to_string());

        let full = TransitionError::CapacityReached(ShiftCapacity { quantity: 2, accepted: 2 });
        let err = ApplicationStorageError::from(full.clone());
        assert_eq!(err.to_string(), full.to_string());
    }
}
