use std::collections::BTreeSet;

use chrono::NaiveDate;
use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument};

use crate::api::shifts::{ExpansionOutcome, ShiftDateView, ShiftDemandUpdate};
use crate::db::snapshots::{count_accepted, interval_for, lock_shift};
use crate::db::util::{parse_enum, TimedClientExt};
use crate::db::{db_error, PgPool};
use crate::model::{JobPostingStatus, ShiftDate, ShiftTemplateRecord};
use crate::schedule::expander::{expand, ActiveWindow, ExpansionError, ExpansionRequest, ShiftTemplate};

db_error!(ShiftStorageError {
    #[error("job not found: {0}")]
    JobNotFound(i64),
    #[error("shift template not found: {0}")]
    TemplateNotFound(i64),
    #[error("shift not found: {0}")]
    ShiftNotFound(i64),
    #[error("{0}")]
    Expansion(#[from] ExpansionError),
    #[error("quantity {requested} is below the {accepted} already accepted workers")]
    QuantityBelowAccepted { accepted: i32, requested: i32 },
    #[error("shift {0} has applications and cannot be deleted")]
    HasApplications(i64),
    #[error("the posting is {} and can no longer change its shifts", .0.as_ref())]
    PostingClosed(JobPostingStatus),
    #[error("unexpected shift row: {0}")]
    Mapping(String),
});

type Result<T> = std::result::Result<T, ShiftStorageError>;

const TEMPLATE_COLUMNS: &str = "id, job_id, start_hour, end_hour, salary, created_at";
const SHIFT_DATE_COLUMNS: &str =
    "id, template_id, shift_date, quantity, gender_requirement, salary_override, created_at";

fn row_to_template(row: &Row) -> Result<ShiftTemplateRecord> {
    Ok(ShiftTemplateRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        template: ShiftTemplate {
            start_hour: row.try_get("start_hour")?,
            end_hour: row.try_get("end_hour")?,
            salary: row.try_get("salary")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_shift_date(row: &Row) -> Result<ShiftDate> {
    Ok(ShiftDate {
        id: row.try_get("id")?,
        template_id: row.try_get("template_id")?,
        shift_date: row.try_get("shift_date")?,
        quantity: row.try_get("quantity")?,
        gender_requirement: parse_enum(row, "gender_requirement").map_err(ShiftStorageError::Mapping)?,
        salary_override: row.try_get("salary_override")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ensure_editable(status: JobPostingStatus) -> Result<()> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(ShiftStorageError::PostingClosed(status))
    }
}

/// Locks the shift date and refuses when its posting is closed or expired.
async fn lock_editable_shift(client: &impl GenericClient, shift_date_id: i64) -> Result<()> {
    if !lock_shift(client, shift_date_id).await? {
        return Err(ShiftStorageError::ShiftNotFound(shift_date_id));
    }
    let posting = client
        .query_one(
            "SELECT p.status FROM sb.shift_dates sd
             JOIN sb.shift_templates t ON t.id = sd.template_id
             JOIN sb.jobs j ON j.id = t.job_id
             JOIN sb.job_postings p ON p.id = j.posting_id
             WHERE sd.id = $1",
            &[&shift_date_id],
        )
        .await?;
    ensure_editable(parse_enum(&posting, "status").map_err(ShiftStorageError::Mapping)?)
}

#[instrument(skip(pool))]
pub async fn create_template(
    pool: &PgPool,
    job_id: i64,
    template: &ShiftTemplate,
) -> Result<ShiftTemplateRecord> {
    let client = pool.get().await?;
    let posting = client
        .query_opt(
            "SELECT p.status FROM sb.jobs j
             JOIN sb.job_postings p ON p.id = j.posting_id
             WHERE j.id = $1",
            &[&job_id],
        )
        .await?
        .ok_or(ShiftStorageError::JobNotFound(job_id))?;
    ensure_editable(parse_enum(&posting, "status").map_err(ShiftStorageError::Mapping)?)?;

    let row = client
        .query_one(
            &format!(
                "INSERT INTO sb.shift_templates (job_id, start_hour, end_hour, salary)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {TEMPLATE_COLUMNS}"
            ),
            &[&job_id, &template.start_hour, &template.end_hour, &template.salary],
        )
        .await?;
    let created = row_to_template(&row)?;
    info!(template_id = created.id, job_id, "shift template created");
    Ok(created)
}

#[instrument(skip(pool))]
pub async fn list_templates(pool: &PgPool, job_id: i64) -> Result<Vec<ShiftTemplateRecord>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {TEMPLATE_COLUMNS} FROM sb.shift_templates
                 WHERE job_id = $1 ORDER BY start_hour, id"
            ),
            &[&job_id],
        )
        .await?;
    rows.iter().map(row_to_template).collect()
}

/// Materializes shift dates for a template. Dates the template already has
/// are reported back as skipped.
///
/// The posting row is held `FOR SHARE` so a concurrent window edit cannot
/// slip a date outside the active window.
#[instrument(skip(pool, request))]
pub async fn expand_template(
    pool: &PgPool,
    template_id: i64,
    request: &ExpansionRequest,
    today: NaiveDate,
) -> Result<ExpansionOutcome> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_opt(
            "SELECT t.start_hour, t.end_hour, t.salary, p.status, p.starts_on, p.ends_on
             FROM sb.shift_templates t
             JOIN sb.jobs j ON j.id = t.job_id
             JOIN sb.job_postings p ON p.id = j.posting_id
             WHERE t.id = $1
             FOR SHARE OF p",
            &[&template_id],
        )
        .await?
        .ok_or(ShiftStorageError::TemplateNotFound(template_id))?;
    ensure_editable(parse_enum(&row, "status").map_err(ShiftStorageError::Mapping)?)?;
    let template = ShiftTemplate {
        start_hour: row.try_get("start_hour")?,
        end_hour: row.try_get("end_hour")?,
        salary: row.try_get("salary")?,
    };
    let window = ActiveWindow {
        starts_on: row.try_get("starts_on")?,
        ends_on: row.try_get("ends_on")?,
    };

    let existing: BTreeSet<NaiveDate> = tx
        .query(
            "SELECT shift_date FROM sb.shift_dates WHERE template_id = $1",
            &[&template_id],
        )
        .await?
        .iter()
        .map(|r| r.try_get("shift_date"))
        .collect::<std::result::Result<_, _>>()?;

    let plan = expand(&template, &window, &existing, request, today)?;

    let mut outcome = ExpansionOutcome { created: Vec::with_capacity(plan.dates.len()), skipped: plan.skipped };
    for date in plan.dates {
        let inserted = tx
            .query_opt(
                &format!(
                    "INSERT INTO sb.shift_dates (
                        template_id, shift_date, quantity, gender_requirement, salary_override
                     ) VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT ON CONSTRAINT uq_shift_dates_template_date DO NOTHING
                     RETURNING {SHIFT_DATE_COLUMNS}"
                ),
                &[
                    &template_id,
                    &date,
                    &plan.demand.quantity,
                    &plan.demand.gender_requirement.as_ref(),
                    &plan.demand.salary_override,
                ],
            )
            .await?;
        match inserted {
            Some(row) => outcome.created.push(row_to_shift_date(&row)?),
            None => outcome.skipped.push(date),
        }
    }
    tx.commit().await?;

    metrics::counter!("sb_shift_dates_created_total").increment(outcome.created.len() as u64);
    info!(
        template_id,
        created = outcome.created.len(),
        skipped = outcome.skipped.len(),
        "shift template expanded"
    );
    Ok(outcome)
}

/// Shift dates of a posting in chronological order, with application counts.
#[instrument(skip(pool))]
pub async fn list_posting_shifts(pool: &PgPool, posting_id: i64) -> Result<Vec<ShiftDateView>> {
    let client = pool.get().await?;
    let rows = client
        .timed_query(
            "SELECT sd.id, sd.template_id, sd.shift_date, sd.quantity, sd.gender_requirement,
                    sd.salary_override, sd.created_at, j.id AS job_id, j.position_id,
                    t.start_hour, t.end_hour, t.salary,
                    COUNT(a.id) FILTER (WHERE a.status = 'accepted') AS accepted_count,
                    COUNT(a.id) FILTER (WHERE a.status = 'pending') AS pending_count
             FROM sb.shift_dates sd
             JOIN sb.shift_templates t ON t.id = sd.template_id
             JOIN sb.jobs j ON j.id = t.job_id
             LEFT JOIN sb.applications a ON a.shift_date_id = sd.id
             WHERE j.posting_id = $1
             GROUP BY sd.id, j.id, t.id
             ORDER BY sd.shift_date, t.start_hour, sd.id",
            &[&posting_id],
            "list_posting_shifts",
        )
        .await?;

    rows.iter()
        .map(|row| {
            let shift = row_to_shift_date(row)?;
            let start_hour: i16 = row.try_get("start_hour")?;
            let end_hour: i16 = row.try_get("end_hour")?;
            let salary: i64 = row.try_get("salary")?;
            Ok(ShiftDateView {
                interval: interval_for(shift.shift_date, start_hour, end_hour),
                salary: shift.salary_override.unwrap_or(salary),
                job_id: row.try_get("job_id")?,
                position_id: row.try_get("position_id")?,
                start_hour,
                end_hour,
                accepted_count: row.try_get("accepted_count")?,
                pending_count: row.try_get("pending_count")?,
                shift,
            })
        })
        .collect()
}

/// Changes quantity, gender requirement or salary override. The quantity
/// can never drop below the number of accepted workers.
#[instrument(skip(pool, update))]
pub async fn update_shift_demand(
    pool: &PgPool,
    shift_date_id: i64,
    update: &ShiftDemandUpdate,
) -> Result<ShiftDate> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    lock_editable_shift(&tx, shift_date_id).await?;
    if update.quantity.is_some() {
        let accepted = count_accepted(&tx, shift_date_id).await?;
        if let Some(requested) = update.quantity_below(accepted) {
            return Err(ShiftStorageError::QuantityBelowAccepted { accepted, requested });
        }
    }

    let gender = update.gender_requirement.map(|g| g.as_ref().to_string());
    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.shift_dates SET
                    quantity = COALESCE($2, quantity),
                    gender_requirement = COALESCE($3, gender_requirement),
                    salary_override = CASE WHEN $5 THEN NULL ELSE COALESCE($4, salary_override) END,
                    updated_at = NOW()
                 WHERE id = $1
                 RETURNING {SHIFT_DATE_COLUMNS}"
            ),
            &[
                &shift_date_id,
                &update.quantity,
                &gender,
                &update.salary_override,
                &update.clear_salary_override,
            ],
        )
        .await?;
    let updated = row_to_shift_date(&row)?;
    tx.commit().await?;

    info!(shift_date_id, quantity = updated.quantity, "shift demand updated");
    Ok(updated)
}

/// Deletes a shift date nobody has applied to.
#[instrument(skip(pool))]
pub async fn delete_shift_date(pool: &PgPool, shift_date_id: i64) -> Result<()> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    lock_editable_shift(&tx, shift_date_id).await?;
    let has_applications = tx
        .query_opt(
            "SELECT 1 FROM sb.applications WHERE shift_date_id = $1 LIMIT 1",
            &[&shift_date_id],
        )
        .await?
        .is_some();
    if has_applications {
        return Err(ShiftStorageError::HasApplications(shift_date_id));
    }
    tx.execute("DELETE FROM sb.shift_dates WHERE id = $1", &[&shift_date_id])
        .await?;
    tx.commit().await?;

    info!(shift_date_id, "shift date deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_expired_postings_refuse_shift_changes() {
        assert!(ensure_editable(JobPostingStatus::Draft).is_ok());
        assert!(ensure_editable(JobPostingStatus::Published).is_ok());
        for status in [JobPostingStatus::Closed, JobPostingStatus::Expired] {
            let err = ensure_editable(status).unwrap_err();
            assert!(matches!(err, ShiftStorageError::PostingClosed(s) if s == status));
            assert!(err.to_string().contains(status.as_ref()));
        }
    }

    #[test]
    fn nested_domain_errors_keep_their_message() {
        let err = ShiftStorageError::from(ExpansionError::ZeroQuantity);
        assert_eq!(err.to_string(), "quantity must be at least 1");
    }
}
