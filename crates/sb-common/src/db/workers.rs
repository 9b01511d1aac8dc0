use tokio_postgres::types::Json;
use tokio_postgres::Row;
use tracing::{info, instrument, warn};

use crate::api::workers::{IdentityReview, IdentitySubmission, WorkerPreferencesUpdate, WorkerProfileInput};
use crate::db::users::active_role;
use crate::db::util::{parse_enum, parse_enum_opt, unique_violation};
use crate::db::{db_error, PgPool};
use crate::model::{ProfileStatus, UserRole, WorkerProfile};
use crate::schedule::availability::{Availability, AvailabilityError, AvailabilitySet};

db_error!(WorkerStorageError {
    #[error("worker profile not found: {0}")]
    NotFound(i64),
    #[error("worker profile already exists for user {0}")]
    AlreadyExists(i64),
    #[error("user {0} is not an active worker")]
    NotAWorker(i64),
    #[error("invalid availability: {0}")]
    InvalidAvailability(#[from] AvailabilityError),
    #[error("identity is already verified")]
    IdentityAlreadyVerified,
    #[error("no identity submission is waiting for review")]
    NoPendingIdentity,
    #[error("unexpected worker row: {0}")]
    Mapping(String),
});

type Result<T> = std::result::Result<T, WorkerStorageError>;

pub(crate) const WORKER_COLUMNS: &str = "user_id, preferred_positions, preferred_locations, \
     expected_salary, gender, availability, status, is_identity_verified, identity_type, \
     identity_images, identity_reject_reason, reliability_score, total_jobs_completed, \
     no_show_count, created_at, updated_at";

pub(crate) fn row_to_worker(row: &Row) -> Result<WorkerProfile> {
    let Json(availability): Json<Vec<Availability>> = row.try_get("availability")?;
    Ok(WorkerProfile {
        user_id: row.try_get("user_id")?,
        preferred_positions: row.try_get("preferred_positions")?,
        preferred_locations: row.try_get("preferred_locations")?,
        expected_salary: row.try_get("expected_salary")?,
        gender: parse_enum_opt(row, "gender").map_err(WorkerStorageError::Mapping)?,
        availability,
        status: parse_enum(row, "status").map_err(WorkerStorageError::Mapping)?,
        is_identity_verified: row.try_get("is_identity_verified")?,
        identity_type: parse_enum_opt(row, "identity_type").map_err(WorkerStorageError::Mapping)?,
        identity_images: row.try_get("identity_images")?,
        identity_reject_reason: row.try_get("identity_reject_reason")?,
        reliability_score: row.try_get("reliability_score")?,
        total_jobs_completed: row.try_get("total_jobs_completed")?,
        no_show_count: row.try_get("no_show_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Validated availability index of a stored profile. Rows written before a
/// rule change may no longer validate; those workers are treated as having
/// no availability.
pub(crate) fn availability_index(profile: &WorkerProfile) -> AvailabilitySet {
    AvailabilitySet::new(&profile.availability).unwrap_or_else(|err| {
        warn!(worker_id = profile.user_id, error = %err, "stored availability no longer validates");
        AvailabilitySet::default()
    })
}

fn trimmed(locations: &[String]) -> Vec<String> {
    locations.iter().map(|l| l.trim().to_string()).collect()
}

#[instrument(skip(pool, input))]
pub async fn create_worker_profile(
    pool: &PgPool,
    user_id: i64,
    input: &WorkerProfileInput,
) -> Result<WorkerProfile> {
    AvailabilitySet::new(&input.availability)?;

    let client = pool.get().await?;
    if active_role(&client, user_id).await? != Some(UserRole::Worker) {
        return Err(WorkerStorageError::NotAWorker(user_id));
    }

    let gender = input.gender.map(|g| g.as_ref().to_string());
    let row = client
        .query_one(
            &format!(
                "INSERT INTO sb.workers (
                    user_id, preferred_positions, preferred_locations, expected_salary,
                    gender, availability
                 ) VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[
                &user_id,
                &input.preferred_positions,
                &trimmed(&input.preferred_locations),
                &input.expected_salary,
                &gender,
                &Json(&input.availability),
            ],
        )
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(_) => WorkerStorageError::AlreadyExists(user_id),
            None => err.into(),
        })?;
    info!(user_id, "worker profile created");
    row_to_worker(&row)
}

#[instrument(skip(pool))]
pub async fn get_worker_profile(pool: &PgPool, user_id: i64) -> Result<Option<WorkerProfile>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {WORKER_COLUMNS} FROM sb.workers WHERE user_id = $1"),
            &[&user_id],
        )
        .await?;
    row.as_ref().map(row_to_worker).transpose()
}

#[instrument(skip(pool, update))]
pub async fn update_worker_preferences(
    pool: &PgPool,
    user_id: i64,
    update: &WorkerPreferencesUpdate,
) -> Result<WorkerProfile> {
    let client = pool.get().await?;
    let locations = update.preferred_locations.as_deref().map(trimmed);
    let gender = update.gender.map(|g| g.as_ref().to_string());
    let status = update.status.map(|s| s.as_ref().to_string());
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.workers SET
                    preferred_positions = COALESCE($2, preferred_positions),
                    preferred_locations = COALESCE($3, preferred_locations),
                    expected_salary = COALESCE($4, expected_salary),
                    gender = COALESCE($5, gender),
                    status = CASE WHEN status = 'SUSPENDED' THEN status ELSE COALESCE($6, status) END,
                    updated_at = NOW()
                 WHERE user_id = $1
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[
                &user_id,
                &update.preferred_positions,
                &locations,
                &update.expected_salary,
                &gender,
                &status,
            ],
        )
        .await?
        .ok_or(WorkerStorageError::NotFound(user_id))?;
    row_to_worker(&row)
}

/// Replaces the whole availability list after checking that no windows
/// overlap.
#[instrument(skip(pool, availability), fields(entries = availability.len()))]
pub async fn replace_availability(
    pool: &PgPool,
    user_id: i64,
    availability: &[Availability],
) -> Result<WorkerProfile> {
    AvailabilitySet::new(availability)?;

    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.workers SET availability = $2, updated_at = NOW()
                 WHERE user_id = $1
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[&user_id, &Json(availability)],
        )
        .await?
        .ok_or(WorkerStorageError::NotFound(user_id))?;
    row_to_worker(&row)
}

#[instrument(skip(pool, submission))]
pub async fn submit_identity(
    pool: &PgPool,
    user_id: i64,
    submission: &IdentitySubmission,
) -> Result<WorkerProfile> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.workers SET
                    identity_type = $2,
                    identity_images = $3,
                    identity_reject_reason = NULL,
                    updated_at = NOW()
                 WHERE user_id = $1 AND NOT is_identity_verified
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[&user_id, &submission.identity_type.as_ref(), &submission.images],
        )
        .await?;
    match row {
        Some(row) => row_to_worker(&row),
        None => match get_worker_profile(pool, user_id).await? {
            Some(_) => Err(WorkerStorageError::IdentityAlreadyVerified),
            None => Err(WorkerStorageError::NotFound(user_id)),
        },
    }
}

/// Admin decision on a submitted identity. A submission is pending while it
/// has images, is unverified and carries no reject reason.
#[instrument(skip(pool, review))]
pub async fn review_identity(
    pool: &PgPool,
    user_id: i64,
    review: &IdentityReview,
) -> Result<WorkerProfile> {
    let (verified, reason) = match review {
        IdentityReview::Approve => (true, None),
        IdentityReview::Reject { reason } => (false, Some(reason.trim())),
    };
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.workers SET
                    is_identity_verified = $2,
                    identity_reject_reason = $3,
                    updated_at = NOW()
                 WHERE user_id = $1
                   AND NOT is_identity_verified
                   AND identity_reject_reason IS NULL
                   AND cardinality(identity_images) > 0
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[&user_id, &verified, &reason],
        )
        .await?
        .ok_or(WorkerStorageError::NoPendingIdentity)?;
    info!(user_id, verified, "identity reviewed");
    row_to_worker(&row)
}

/// Admin override of the profile status, including suspension.
#[instrument(skip(pool))]
pub async fn set_worker_status(
    pool: &PgPool,
    user_id: i64,
    status: ProfileStatus,
) -> Result<WorkerProfile> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.workers SET status = $2, updated_at = NOW()
                 WHERE user_id = $1
                 RETURNING {WORKER_COLUMNS}"
            ),
            &[&user_id, &status.as_ref()],
        )
        .await?
        .ok_or(WorkerStorageError::NotFound(user_id))?;
    info!(user_id, status = status.as_ref(), "worker status set");
    row_to_worker(&row)
}
