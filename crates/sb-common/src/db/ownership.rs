use std::fmt;

use tracing::instrument;

use crate::db::{db_error, PgPool};

/// A resource that belongs to exactly one organization through its posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedResource {
    Posting(i64),
    Job(i64),
    Template(i64),
    Shift(i64),
    Application(i64),
}

impl fmt::Display for OwnedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posting(id) => write!(f, "posting {id}"),
            Self::Job(id) => write!(f, "job {id}"),
            Self::Template(id) => write!(f, "shift template {id}"),
            Self::Shift(id) => write!(f, "shift {id}"),
            Self::Application(id) => write!(f, "application {id}"),
        }
    }
}

db_error!(OwnershipError {
    #[error("{0} not found")]
    NotFound(OwnedResource),
});

impl OwnedResource {
    fn lookup_sql(&self) -> (&'static str, i64) {
        match *self {
            Self::Posting(id) => ("SELECT p.organization_id FROM sb.job_postings p WHERE p.id = $1", id),
            Self::Job(id) => (
                "SELECT p.organization_id FROM sb.jobs j
                 JOIN sb.job_postings p ON p.id = j.posting_id
                 WHERE j.id = $1",
                id,
            ),
            Self::Template(id) => (
                "SELECT p.organization_id FROM sb.shift_templates t
                 JOIN sb.jobs j ON j.id = t.job_id
                 JOIN sb.job_postings p ON p.id = j.posting_id
                 WHERE t.id = $1",
                id,
            ),
            Self::Shift(id) => (
                "SELECT p.organization_id FROM sb.shift_dates sd
                 JOIN sb.shift_templates t ON t.id = sd.template_id
                 JOIN sb.jobs j ON j.id = t.job_id
                 JOIN sb.job_postings p ON p.id = j.posting_id
                 WHERE sd.id = $1",
                id,
            ),
            Self::Application(id) => (
                "SELECT p.organization_id FROM sb.applications a
                 JOIN sb.shift_dates sd ON sd.id = a.shift_date_id
                 JOIN sb.shift_templates t ON t.id = sd.template_id
                 JOIN sb.jobs j ON j.id = t.job_id
                 JOIN sb.job_postings p ON p.id = j.posting_id
                 WHERE a.id = $1",
                id,
            ),
        }
    }
}

/// Organization that owns `resource`.
#[instrument(skip(pool))]
pub async fn organization_of(pool: &PgPool, resource: OwnedResource) -> Result<i64, OwnershipError> {
    let client = pool.get().await?;
    let (sql, id) = resource.lookup_sql();
    let stmt = client.prepare_cached(sql).await?;
    let row = client
        .query_opt(&stmt, &[&id])
        .await?
        .ok_or(OwnershipError::NotFound(resource))?;
    Ok(row.try_get("organization_id")?)
}
