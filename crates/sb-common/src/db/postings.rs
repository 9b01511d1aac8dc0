use chrono::{NaiveDate, NaiveDateTime};
use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument};

use crate::api::postings::{
    NewPosting, OrganizationPostingFilter, PostingDetail, PostingFilter, PostingUpdate,
};
use crate::api::{ListResponse, Pagination, ValidationError};
use crate::db::util::{like_pattern, parse_enum, TimedClientExt};
use crate::db::{db_error, PgPool};
use crate::model::{Job, JobPosting, JobPostingStatus, Location, OrganizationLevel};

db_error!(PostingStorageError {
    #[error("posting not found: {0}")]
    NotFound(i64),
    #[error("cannot move a posting from {} to {}", .from.as_ref(), .to.as_ref())]
    InvalidStatus {
        from: JobPostingStatus,
        to: JobPostingStatus,
    },
    #[error("a {} posting can no longer be edited", .0.as_ref())]
    NotEditable(JobPostingStatus),
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error("the new active window would leave shifts dated {first}..{last} outside it")]
    WindowExcludesShifts { first: NaiveDate, last: NaiveDate },
    #[error("published posting quota reached ({limit})")]
    QuotaReached { limit: i64 },
    #[error("organization {0} is inactive or deleted")]
    OrganizationUnavailable(i64),
    #[error("a posting needs at least one upcoming shift date to be published")]
    NoUpcomingShifts,
    #[error("unknown or inactive position: {0}")]
    UnknownPosition(i64),
    #[error("unexpected posting row: {0}")]
    Mapping(String),
});

type Result<T> = std::result::Result<T, PostingStorageError>;

const POSTING_COLUMNS: &str = "id, organization_id, poster_id, title, description, \
     province_code, district_code, ward_code, address, requirements, benefits, starts_on, \
     ends_on, published_at, status, view_count, application_count, created_at, updated_at";

fn row_to_posting(row: &Row) -> Result<JobPosting> {
    Ok(JobPosting {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        poster_id: row.try_get("poster_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: Location {
            province_code: row.try_get("province_code")?,
            district_code: row.try_get("district_code")?,
            ward_code: row.try_get("ward_code")?,
            address: row.try_get("address")?,
        },
        requirements: row.try_get("requirements")?,
        benefits: row.try_get("benefits")?,
        starts_on: row.try_get("starts_on")?,
        ends_on: row.try_get("ends_on")?,
        published_at: row.try_get("published_at")?,
        status: parse_enum(row, "status").map_err(PostingStorageError::Mapping)?,
        view_count: row.try_get("view_count")?,
        application_count: row.try_get("application_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_job(row: &Row) -> Result<Job> {
    Ok(Job {
        id: row.try_get("id")?,
        posting_id: row.try_get("posting_id")?,
        position_id: row.try_get("position_id")?,
        description: row.try_get("description")?,
    })
}

async fn jobs_of(client: &impl GenericClient, posting_id: i64) -> Result<Vec<Job>> {
    let rows = client
        .query(
            "SELECT id, posting_id, position_id, description FROM sb.jobs
             WHERE posting_id = $1 ORDER BY id",
            &[&posting_id],
        )
        .await?;
    rows.iter().map(row_to_job).collect()
}

async fn lock_posting(client: &impl GenericClient, posting_id: i64) -> Result<JobPosting> {
    let row = client
        .query_opt(
            &format!("SELECT {POSTING_COLUMNS} FROM sb.job_postings WHERE id = $1 FOR UPDATE"),
            &[&posting_id],
        )
        .await?
        .ok_or(PostingStorageError::NotFound(posting_id))?;
    row_to_posting(&row)
}

fn ensure_transition(posting: &JobPosting, to: JobPostingStatus) -> Result<()> {
    if posting.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(PostingStorageError::InvalidStatus { from: posting.status, to })
    }
}

/// Creates a draft posting together with its jobs.
#[instrument(skip(pool, posting), fields(title = %posting.title))]
pub async fn create_posting(
    pool: &PgPool,
    organization_id: i64,
    poster_id: i64,
    posting: &NewPosting,
) -> Result<PostingDetail> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let org_open = tx
        .query_opt(
            "SELECT 1 FROM sb.organizations WHERE id = $1 AND is_active AND NOT is_deleted",
            &[&organization_id],
        )
        .await?
        .is_some();
    if !org_open {
        return Err(PostingStorageError::OrganizationUnavailable(organization_id));
    }

    let position_ids: Vec<i64> = posting.jobs.iter().map(|j| j.position_id).collect();
    let active: Vec<i64> = tx
        .query(
            "SELECT id FROM sb.positions WHERE id = ANY($1) AND is_active",
            &[&position_ids],
        )
        .await?
        .iter()
        .map(|r| r.try_get("id"))
        .collect::<std::result::Result<_, _>>()?;
    if let Some(missing) = position_ids.iter().find(|id| !active.contains(id)) {
        return Err(PostingStorageError::UnknownPosition(*missing));
    }

    let row = tx
        .query_one(
            &format!(
                "INSERT INTO sb.job_postings (
                    organization_id, poster_id, title, description, province_code,
                    district_code, ward_code, address, requirements, benefits, starts_on, ends_on
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 RETURNING {POSTING_COLUMNS}"
            ),
            &[
                &organization_id,
                &poster_id,
                &posting.title.trim(),
                &posting.description,
                &posting.location.province_code,
                &posting.location.district_code,
                &posting.location.ward_code,
                &posting.location.address,
                &posting.requirements,
                &posting.benefits,
                &posting.starts_on,
                &posting.ends_on,
            ],
        )
        .await?;
    let created = row_to_posting(&row)?;

    let mut jobs = Vec::with_capacity(posting.jobs.len());
    for job in &posting.jobs {
        let row = tx
            .query_one(
                "INSERT INTO sb.jobs (posting_id, position_id, description)
                 VALUES ($1, $2, $3)
                 RETURNING id, posting_id, position_id, description",
                &[&created.id, &job.position_id, &job.description],
            )
            .await?;
        jobs.push(row_to_job(&row)?);
    }
    tx.commit().await?;

    info!(posting_id = created.id, organization_id, jobs = jobs.len(), "posting created");
    Ok(PostingDetail { posting: created, jobs })
}

/// Fetches a posting with its jobs. Reads of a published posting count as
/// a view.
#[instrument(skip(pool))]
pub async fn get_posting(pool: &PgPool, posting_id: i64) -> Result<Option<PostingDetail>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.job_postings
                 SET view_count = view_count + CASE WHEN status = 'PUBLISHED' THEN 1 ELSE 0 END
                 WHERE id = $1
                 RETURNING {POSTING_COLUMNS}"
            ),
            &[&posting_id],
        )
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let posting = row_to_posting(&row)?;
    let jobs = jobs_of(&client, posting_id).await?;
    Ok(Some(PostingDetail { posting, jobs }))
}

/// Published postings, most recently published first.
#[instrument(skip(pool, filter))]
pub async fn list_published_postings(
    pool: &PgPool,
    filter: &PostingFilter,
    page: Pagination,
) -> Result<ListResponse<JobPosting>> {
    let client = pool.get().await?;
    let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);
    let rows = client
        .timed_query(
            &format!(
                "SELECT {POSTING_COLUMNS} FROM sb.job_postings p
                 WHERE p.status = 'PUBLISHED'
                   AND ($1::TEXT IS NULL OR p.province_code = $1)
                   AND ($2::BIGINT IS NULL OR p.organization_id = $2)
                   AND ($3::BIGINT IS NULL OR EXISTS (
                        SELECT 1 FROM sb.jobs j WHERE j.posting_id = p.id AND j.position_id = $3))
                   AND (($4::DATE IS NULL AND $5::DATE IS NULL) OR EXISTS (
                        SELECT 1 FROM sb.jobs j
                        JOIN sb.shift_templates t ON t.job_id = j.id
                        JOIN sb.shift_dates sd ON sd.template_id = t.id
                        WHERE j.posting_id = p.id
                          AND ($4::DATE IS NULL OR sd.shift_date >= $4)
                          AND ($5::DATE IS NULL OR sd.shift_date <= $5)))
                   AND ($6::TEXT IS NULL OR p.title ILIKE $6)
                 ORDER BY p.published_at DESC, p.id DESC
                 LIMIT $7 OFFSET $8"
            ),
            &[
                &filter.province_code,
                &filter.organization_id,
                &filter.position_id,
                &filter.from,
                &filter.to,
                &search,
                &page.probe_limit(),
                &page.offset,
            ],
            "list_published_postings",
        )
        .await?;
    let items = rows.iter().map(row_to_posting).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

/// Every posting of an organization regardless of status, newest first.
#[instrument(skip(pool, filter))]
pub async fn list_organization_postings(
    pool: &PgPool,
    organization_id: i64,
    filter: &OrganizationPostingFilter,
    page: Pagination,
) -> Result<ListResponse<JobPosting>> {
    let client = pool.get().await?;
    let status = filter.status.map(|s| s.as_ref().to_string());
    let rows = client
        .query(
            &format!(
                "SELECT {POSTING_COLUMNS} FROM sb.job_postings
                 WHERE organization_id = $1 AND ($2::TEXT IS NULL OR status = $2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&organization_id, &status, &page.probe_limit(), &page.offset],
        )
        .await?;
    let items = rows.iter().map(row_to_posting).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

/// Edits a draft or published posting. A new active window must still
/// contain every existing shift date.
#[instrument(skip(pool, update))]
pub async fn update_posting(
    pool: &PgPool,
    posting_id: i64,
    update: &PostingUpdate,
) -> Result<JobPosting> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    let current = lock_posting(&tx, posting_id).await?;
    if !current.status.is_editable() {
        return Err(PostingStorageError::NotEditable(current.status));
    }

    let window = update.apply_window(current.active_window())?;
    if window != current.active_window() {
        let bounds = tx
            .query_one(
                "SELECT MIN(sd.shift_date) AS first, MAX(sd.shift_date) AS last
                 FROM sb.shift_dates sd
                 JOIN sb.shift_templates t ON t.id = sd.template_id
                 JOIN sb.jobs j ON j.id = t.job_id
                 WHERE j.posting_id = $1",
                &[&posting_id],
            )
            .await?;
        let first: Option<NaiveDate> = bounds.try_get("first")?;
        let last: Option<NaiveDate> = bounds.try_get("last")?;
        if let (Some(first), Some(last)) = (first, last) {
            if !window.contains_range(first, last) {
                return Err(PostingStorageError::WindowExcludesShifts { first, last });
            }
        }
    }

    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.job_postings SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    province_code = COALESCE($4, province_code),
                    district_code = COALESCE($5, district_code),
                    ward_code = COALESCE($6, ward_code),
                    address = COALESCE($7, address),
                    requirements = COALESCE($8, requirements),
                    benefits = COALESCE($9, benefits),
                    starts_on = $10,
                    ends_on = $11,
                    updated_at = NOW()
                 WHERE id = $1
                 RETURNING {POSTING_COLUMNS}"
            ),
            &[
                &posting_id,
                &update.title.as_deref().map(str::trim),
                &update.description,
                &update.province_code,
                &update.district_code,
                &update.ward_code,
                &update.address,
                &update.requirements,
                &update.benefits,
                &window.starts_on,
                &window.ends_on,
            ],
        )
        .await?;
    let updated = row_to_posting(&row)?;
    tx.commit().await?;
    Ok(updated)
}

/// Moves a draft to `PUBLISHED`, subject to the organization's quota.
#[instrument(skip(pool))]
pub async fn publish_posting(pool: &PgPool, posting_id: i64, today: NaiveDate) -> Result<JobPosting> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    let posting = lock_posting(&tx, posting_id).await?;
    ensure_transition(&posting, JobPostingStatus::Published)?;

    let org = tx
        .query_opt(
            "SELECT verification_level FROM sb.organizations
             WHERE id = $1 AND is_active AND NOT is_deleted
             FOR UPDATE",
            &[&posting.organization_id],
        )
        .await?
        .ok_or(PostingStorageError::OrganizationUnavailable(posting.organization_id))?;
    let level: i16 = org.try_get("verification_level")?;
    let level = OrganizationLevel::try_from(level).map_err(PostingStorageError::Mapping)?;

    if let Some(limit) = level.published_posting_quota() {
        let published: i64 = tx
            .query_one(
                "SELECT COUNT(*) FROM sb.job_postings
                 WHERE organization_id = $1 AND status = 'PUBLISHED'",
                &[&posting.organization_id],
            )
            .await?
            .try_get(0)?;
        if published >= limit {
            return Err(PostingStorageError::QuotaReached { limit });
        }
    }

    let upcoming = tx
        .query_opt(
            "SELECT 1 FROM sb.shift_dates sd
             JOIN sb.shift_templates t ON t.id = sd.template_id
             JOIN sb.jobs j ON j.id = t.job_id
             WHERE j.posting_id = $1 AND sd.shift_date >= $2
             LIMIT 1",
            &[&posting_id, &today],
        )
        .await?
        .is_some();
    if !upcoming {
        return Err(PostingStorageError::NoUpcomingShifts);
    }

    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.job_postings
                 SET status = 'PUBLISHED', published_at = NOW(), updated_at = NOW()
                 WHERE id = $1
                 RETURNING {POSTING_COLUMNS}"
            ),
            &[&posting_id],
        )
        .await?;
    let published = row_to_posting(&row)?;
    tx.commit().await?;

    info!(posting_id, organization_id = published.organization_id, "posting published");
    Ok(published)
}

/// Closes a posting and rejects pending applications on its shifts dated
/// today or later.
#[instrument(skip(pool))]
pub async fn close_posting(pool: &PgPool, posting_id: i64, today: NaiveDate) -> Result<JobPosting> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    let posting = lock_posting(&tx, posting_id).await?;
    ensure_transition(&posting, JobPostingStatus::Closed)?;

    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.job_postings SET status = 'CLOSED', updated_at = NOW()
                 WHERE id = $1
                 RETURNING {POSTING_COLUMNS}"
            ),
            &[&posting_id],
        )
        .await?;
    let closed = row_to_posting(&row)?;

    let rejected = tx
        .execute(
            "UPDATE sb.applications a SET status = 'rejected', decided_at = NOW(), updated_at = NOW()
             FROM sb.shift_dates sd
             JOIN sb.shift_templates t ON t.id = sd.template_id
             JOIN sb.jobs j ON j.id = t.job_id
             WHERE a.shift_date_id = sd.id
               AND j.posting_id = $1
               AND sd.shift_date >= $2
               AND a.status = 'pending'",
            &[&posting_id, &today],
        )
        .await?;
    tx.commit().await?;

    info!(posting_id, rejected, "posting closed");
    Ok(closed)
}

/// Marks published postings whose window ended, or whose last shift date is
/// in the past, as `EXPIRED`. Returns how many were expired.
#[instrument(skip(pool))]
pub async fn expire_postings(pool: &PgPool, today: NaiveDate) -> Result<u64> {
    let client = pool.get().await?;
    let expired = client
        .timed_execute(
            "UPDATE sb.job_postings p SET status = 'EXPIRED', updated_at = NOW()
             WHERE p.status = 'PUBLISHED'
               AND (
                 (p.ends_on IS NOT NULL AND p.ends_on < $1)
                 OR (
                   SELECT MAX(sd.shift_date) FROM sb.shift_dates sd
                   JOIN sb.shift_templates t ON t.id = sd.template_id
                   JOIN sb.jobs j ON j.id = t.job_id
                   WHERE j.posting_id = p.id
                 ) < $1
               )",
            &[&today],
            "expire_postings",
        )
        .await?;
    if expired > 0 {
        metrics::counter!("sb_postings_expired_total").increment(expired);
        info!(expired, %today, "postings expired");
    }
    Ok(expired)
}

/// Cancels pending applications whose shift has already started.
#[instrument(skip(pool))]
pub async fn cancel_stale_pending_applications(pool: &PgPool, now: NaiveDateTime) -> Result<u64> {
    let client = pool.get().await?;
    let cancelled = client
        .timed_execute(
            "UPDATE sb.applications a SET status = 'cancelled', updated_at = NOW()
             FROM sb.shift_dates sd
             JOIN sb.shift_templates t ON t.id = sd.template_id
             WHERE a.shift_date_id = sd.id
               AND a.status = 'pending'
               AND sd.shift_date + make_interval(hours => t.start_hour::INT) <= $1",
            &[&now],
            "cancel_stale_pending_applications",
        )
        .await?;
    if cancelled > 0 {
        metrics::counter!("sb_applications_expired_total").increment(cancelled);
        info!(cancelled, "stale pending applications cancelled");
    }
    Ok(cancelled)
}
