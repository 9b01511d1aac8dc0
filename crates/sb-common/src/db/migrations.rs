use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "accounts, catalog and organizations",
        sql: r#"
CREATE TABLE IF NOT EXISTS sb.users (
    id BIGSERIAL PRIMARY KEY,
    role TEXT NOT NULL CHECK (role IN ('admin', 'employer', 'worker')),
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    avatar TEXT,
    is_verified BOOLEAN NOT NULL DEFAULT TRUE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_users_email UNIQUE (email),
    CONSTRAINT uq_users_phone UNIQUE (phone)
);

CREATE TABLE IF NOT EXISTS sb.industries (
    id BIGSERIAL PRIMARY KEY,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_industries_code UNIQUE (code)
);

CREATE TABLE IF NOT EXISTS sb.positions (
    id BIGSERIAL PRIMARY KEY,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    industry_id BIGINT NOT NULL REFERENCES sb.industries(id),
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_positions_code UNIQUE (code)
);
CREATE INDEX IF NOT EXISTS idx_positions_industry ON sb.positions(industry_id);

CREATE TABLE IF NOT EXISTS sb.organizations (
    id BIGSERIAL PRIMARY KEY,
    owner_id BIGINT NOT NULL REFERENCES sb.users(id),
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    description TEXT,
    logo TEXT,
    cover_image TEXT,
    industry_id BIGINT NOT NULL REFERENCES sb.industries(id),
    address TEXT NOT NULL,
    province_code TEXT NOT NULL,
    district_code TEXT NOT NULL,
    ward_code TEXT NOT NULL,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    contact_phone TEXT NOT NULL,
    email TEXT NOT NULL,
    website TEXT,
    social_links JSONB NOT NULL DEFAULT '[]'::jsonb,
    tax_code TEXT,
    verification_status TEXT NOT NULL DEFAULT 'NONE'
        CHECK (verification_status IN ('NONE', 'PENDING', 'VERIFIED', 'REJECTED')),
    verification_level SMALLINT NOT NULL DEFAULT 0 CHECK (verification_level BETWEEN 0 AND 2),
    verification_documents JSONB NOT NULL DEFAULT '[]'::jsonb,
    review_note TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_organizations_slug UNIQUE (slug)
);
CREATE INDEX IF NOT EXISTS idx_organizations_owner ON sb.organizations(owner_id);

CREATE TABLE IF NOT EXISTS sb.organization_members (
    organization_id BIGINT NOT NULL REFERENCES sb.organizations(id),
    user_id BIGINT NOT NULL REFERENCES sb.users(id),
    role TEXT NOT NULL CHECK (role IN ('admin', 'staff')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (organization_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_organization_members_user ON sb.organization_members(user_id);
"#,
    },
    Migration {
        id: 2,
        description: "workers, postings, shifts, applications and relationships",
        sql: r#"
CREATE TABLE IF NOT EXISTS sb.workers (
    user_id BIGINT PRIMARY KEY REFERENCES sb.users(id),
    preferred_positions BIGINT[] NOT NULL DEFAULT '{}',
    preferred_locations TEXT[] NOT NULL DEFAULT '{}',
    expected_salary BIGINT NOT NULL DEFAULT 0 CHECK (expected_salary >= 0),
    gender TEXT CHECK (gender IN ('MALE', 'FEMALE', 'OTHER')),
    availability JSONB NOT NULL DEFAULT '[]'::jsonb,
    status TEXT NOT NULL DEFAULT 'PUBLIC' CHECK (status IN ('PUBLIC', 'PRIVATE', 'SUSPENDED')),
    is_identity_verified BOOLEAN NOT NULL DEFAULT FALSE,
    identity_type TEXT CHECK (identity_type IN ('CITIZEN_ID', 'STUDENT_ID')),
    identity_images TEXT[] NOT NULL DEFAULT '{}',
    identity_reject_reason TEXT,
    reliability_score INTEGER NOT NULL DEFAULT 100 CHECK (reliability_score BETWEEN 0 AND 200),
    total_jobs_completed INTEGER NOT NULL DEFAULT 0 CHECK (total_jobs_completed >= 0),
    no_show_count INTEGER NOT NULL DEFAULT 0 CHECK (no_show_count >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_workers_status ON sb.workers(status);

CREATE TABLE IF NOT EXISTS sb.job_postings (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL REFERENCES sb.organizations(id),
    poster_id BIGINT NOT NULL REFERENCES sb.users(id),
    title TEXT NOT NULL,
    description TEXT,
    province_code TEXT,
    district_code TEXT,
    ward_code TEXT,
    address TEXT,
    requirements TEXT,
    benefits TEXT,
    starts_on DATE,
    ends_on DATE,
    published_at TIMESTAMPTZ,
    status TEXT NOT NULL DEFAULT 'DRAFT'
        CHECK (status IN ('DRAFT', 'PUBLISHED', 'CLOSED', 'EXPIRED')),
    view_count BIGINT NOT NULL DEFAULT 0,
    application_count BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_job_postings_window CHECK (starts_on IS NULL OR ends_on IS NULL OR starts_on <= ends_on)
);
CREATE INDEX IF NOT EXISTS idx_job_postings_org_status ON sb.job_postings(organization_id, status);
CREATE INDEX IF NOT EXISTS idx_job_postings_published
    ON sb.job_postings(published_at DESC, id DESC)
    WHERE status = 'PUBLISHED';

CREATE TABLE IF NOT EXISTS sb.jobs (
    id BIGSERIAL PRIMARY KEY,
    posting_id BIGINT NOT NULL REFERENCES sb.job_postings(id),
    position_id BIGINT NOT NULL REFERENCES sb.positions(id),
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_posting ON sb.jobs(posting_id);

CREATE TABLE IF NOT EXISTS sb.shift_templates (
    id BIGSERIAL PRIMARY KEY,
    job_id BIGINT NOT NULL REFERENCES sb.jobs(id),
    start_hour SMALLINT NOT NULL CHECK (start_hour BETWEEN 0 AND 23),
    end_hour SMALLINT NOT NULL CHECK (end_hour BETWEEN 0 AND 24),
    salary BIGINT NOT NULL CHECK (salary > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_shift_templates_length CHECK (start_hour <> end_hour)
);
CREATE INDEX IF NOT EXISTS idx_shift_templates_job ON sb.shift_templates(job_id);

CREATE TABLE IF NOT EXISTS sb.shift_dates (
    id BIGSERIAL PRIMARY KEY,
    template_id BIGINT NOT NULL REFERENCES sb.shift_templates(id),
    shift_date DATE NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    gender_requirement TEXT NOT NULL DEFAULT 'ANY'
        CHECK (gender_requirement IN ('MALE', 'FEMALE', 'ANY')),
    salary_override BIGINT CHECK (salary_override IS NULL OR salary_override > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_shift_dates_template_date UNIQUE (template_id, shift_date)
);
CREATE INDEX IF NOT EXISTS idx_shift_dates_date ON sb.shift_dates(shift_date);

CREATE TABLE IF NOT EXISTS sb.applications (
    id BIGSERIAL PRIMARY KEY,
    worker_id BIGINT NOT NULL REFERENCES sb.workers(user_id),
    shift_date_id BIGINT NOT NULL REFERENCES sb.shift_dates(id),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'accepted', 'rejected', 'cancelled', 'completed', 'no_show')),
    note TEXT,
    decided_by BIGINT REFERENCES sb.users(id),
    decided_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_applications_active
    ON sb.applications(worker_id, shift_date_id)
    WHERE status IN ('pending', 'accepted');
CREATE INDEX IF NOT EXISTS idx_applications_shift_status ON sb.applications(shift_date_id, status);
CREATE INDEX IF NOT EXISTS idx_applications_worker_status ON sb.applications(worker_id, status);

CREATE TABLE IF NOT EXISTS sb.worker_relationships (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL REFERENCES sb.organizations(id),
    worker_id BIGINT NOT NULL REFERENCES sb.users(id),
    relationship_type TEXT NOT NULL
        CHECK (relationship_type IN ('FAVORITE', 'NORMAL', 'RESTRICTED', 'BLOCKED')),
    notes TEXT,
    tags TEXT[] NOT NULL DEFAULT '{}',
    created_by BIGINT REFERENCES sb.users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_worker_relationships_pair UNIQUE (organization_id, worker_id)
);
CREATE INDEX IF NOT EXISTS idx_worker_relationships_type
    ON sb.worker_relationships(organization_id, relationship_type);
"#,
    },
];

/// Applies pending migrations in order, each in its own transaction.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS sb;
             CREATE TABLE IF NOT EXISTS sb.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM sb.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO sb.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_ids_are_strictly_increasing() {
        let ids: Vec<i32> = MIGRATIONS.iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids.first(), Some(&1));
    }

    #[test]
    fn every_statement_targets_the_sb_schema() {
        for migration in MIGRATIONS {
            for line in migration.sql.lines().filter(|l| l.starts_with("CREATE TABLE")) {
                assert!(line.contains(" sb."), "unqualified table in migration {}: {line}", migration.id);
            }
        }
    }
}
