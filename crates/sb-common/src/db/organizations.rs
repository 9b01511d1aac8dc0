use deadpool_postgres::GenericClient;
use tokio_postgres::types::Json;
use tokio_postgres::Row;
use tracing::{info, instrument};

use crate::api::organizations::{
    NewMember, NewOrganization, OrganizationFilter, OrganizationUpdate, VerificationReview,
    VerificationSubmission,
};
use crate::api::{ListResponse, Pagination};
use crate::db::users::active_role;
use crate::db::util::{like_pattern, parse_enum, unique_violation};
use crate::db::{db_error, PgPool};
use crate::model::{
    MemberRole, Organization, OrganizationLevel, OrganizationMember, SocialLink, UserRole,
    VerificationDocument, VerificationStatus,
};
use crate::slug::{next_free_slug, slugify};

db_error!(OrganizationStorageError {
    #[error("organization not found: {0}")]
    NotFound(i64),
    #[error("organization slug already taken: {0}")]
    SlugTaken(String),
    #[error("unknown or inactive industry: {0}")]
    UnknownIndustry(i64),
    #[error("user {0} is not an active employer")]
    NotEmployer(i64),
    #[error("organization is already verified")]
    AlreadyVerified,
    #[error("organization has no pending verification")]
    NotPending,
    #[error("user {0} is not a member of this organization")]
    MemberNotFound(i64),
    #[error("the owner cannot be removed from their organization")]
    CannotRemoveOwner,
    #[error("unexpected organization row: {0}")]
    Mapping(String),
});

type Result<T> = std::result::Result<T, OrganizationStorageError>;

const ORGANIZATION_COLUMNS: &str = "id, owner_id, name, slug, description, logo, cover_image, \
     industry_id, address, province_code, district_code, ward_code, latitude, longitude, \
     contact_phone, email, website, social_links, tax_code, verification_status, \
     verification_level, verification_documents, review_note, is_active, created_at, updated_at";

fn row_to_organization(row: &Row) -> Result<Organization> {
    let Json(social_links): Json<Vec<SocialLink>> = row.try_get("social_links")?;
    let Json(verification_documents): Json<Vec<VerificationDocument>> =
        row.try_get("verification_documents")?;
    let level: i16 = row.try_get("verification_level")?;

    Ok(Organization {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        logo: row.try_get("logo")?,
        cover_image: row.try_get("cover_image")?,
        industry_id: row.try_get("industry_id")?,
        address: row.try_get("address")?,
        province_code: row.try_get("province_code")?,
        district_code: row.try_get("district_code")?,
        ward_code: row.try_get("ward_code")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        contact_phone: row.try_get("contact_phone")?,
        email: row.try_get("email")?,
        website: row.try_get("website")?,
        social_links,
        tax_code: row.try_get("tax_code")?,
        verification_status: parse_enum(row, "verification_status")
            .map_err(OrganizationStorageError::Mapping)?,
        verification_level: OrganizationLevel::try_from(level)
            .map_err(OrganizationStorageError::Mapping)?,
        verification_documents,
        review_note: row.try_get("review_note")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn ensure_active_industry(client: &impl GenericClient, industry_id: i64) -> Result<()> {
    let exists = client
        .query_opt(
            "SELECT 1 FROM sb.industries WHERE id = $1 AND is_active AND NOT is_deleted",
            &[&industry_id],
        )
        .await?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(OrganizationStorageError::UnknownIndustry(industry_id))
    }
}

async fn derive_slug(client: &impl GenericClient, name: &str) -> Result<String> {
    let base = match slugify(name) {
        s if s.is_empty() => "organization".to_string(),
        s => s,
    };
    let rows = client
        .query(
            "SELECT slug FROM sb.organizations WHERE slug = $1 OR slug LIKE $1 || '-%'",
            &[&base],
        )
        .await?;
    let taken: Vec<String> = rows
        .iter()
        .map(|r| r.try_get::<_, String>("slug"))
        .collect::<std::result::Result<_, _>>()?;
    Ok(next_free_slug(&base, taken.iter().map(String::as_str)))
}

/// Creates the organization and makes `owner_id` its first admin member.
#[instrument(skip(pool, org), fields(name = %org.name))]
pub async fn create_organization(
    pool: &PgPool,
    owner_id: i64,
    org: &NewOrganization,
) -> Result<Organization> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let role = active_role(&tx, owner_id).await?;
    if !matches!(role, Some(UserRole::Employer) | Some(UserRole::Admin)) {
        return Err(OrganizationStorageError::NotEmployer(owner_id));
    }
    ensure_active_industry(&tx, org.industry_id).await?;

    let slug = match &org.slug {
        Some(slug) => slug.clone(),
        None => derive_slug(&tx, &org.name).await?,
    };

    let row = tx
        .query_one(
            &format!(
                "INSERT INTO sb.organizations (
                    owner_id, name, slug, description, logo, cover_image, industry_id,
                    address, province_code, district_code, ward_code, latitude, longitude,
                    contact_phone, email, website, social_links, tax_code
                 ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
                 )
                 RETURNING {ORGANIZATION_COLUMNS}"
            ),
            &[
                &owner_id,
                &org.name.trim(),
                &slug,
                &org.description,
                &org.logo,
                &org.cover_image,
                &org.industry_id,
                &org.address.trim(),
                &org.province_code,
                &org.district_code,
                &org.ward_code,
                &org.latitude,
                &org.longitude,
                &org.contact_phone,
                &org.email.trim().to_lowercase(),
                &org.website,
                &Json(&org.social_links),
                &org.tax_code,
            ],
        )
        .await
        .map_err(|err| match unique_violation(&err) {
            Some("uq_organizations_slug") => OrganizationStorageError::SlugTaken(slug.clone()),
            _ => err.into(),
        })?;
    let created = row_to_organization(&row)?;

    tx.execute(
        "INSERT INTO sb.organization_members (organization_id, user_id, role)
         VALUES ($1, $2, 'admin')",
        &[&created.id, &owner_id],
    )
    .await?;
    tx.commit().await?;

    info!(organization_id = created.id, slug = %created.slug, "organization created");
    Ok(created)
}

#[instrument(skip(pool))]
pub async fn get_organization(pool: &PgPool, organization_id: i64) -> Result<Option<Organization>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "SELECT {ORGANIZATION_COLUMNS} FROM sb.organizations
                 WHERE id = $1 AND NOT is_deleted"
            ),
            &[&organization_id],
        )
        .await?;
    row.as_ref().map(row_to_organization).transpose()
}

#[instrument(skip(pool))]
pub async fn get_organization_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Organization>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "SELECT {ORGANIZATION_COLUMNS} FROM sb.organizations
                 WHERE slug = $1 AND NOT is_deleted"
            ),
            &[&slug],
        )
        .await?;
    row.as_ref().map(row_to_organization).transpose()
}

/// Active organizations, newest first.
#[instrument(skip(pool, filter))]
pub async fn list_organizations(
    pool: &PgPool,
    filter: &OrganizationFilter,
    page: Pagination,
) -> Result<ListResponse<Organization>> {
    let client = pool.get().await?;
    let search = filter.search.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern);
    let rows = client
        .query(
            &format!(
                "SELECT {ORGANIZATION_COLUMNS} FROM sb.organizations
                 WHERE is_active AND NOT is_deleted
                   AND ($1::TEXT IS NULL OR name ILIKE $1)
                   AND ($2::BIGINT IS NULL OR industry_id = $2)
                   AND ($3::TEXT IS NULL OR province_code = $3)
                 ORDER BY created_at DESC, id DESC
                 LIMIT $4 OFFSET $5"
            ),
            &[
                &search,
                &filter.industry_id,
                &filter.province_code,
                &page.probe_limit(),
                &page.offset,
            ],
        )
        .await?;
    let items = rows.iter().map(row_to_organization).collect::<Result<Vec<_>>>()?;
    Ok(ListResponse::from_probe(items, page))
}

#[instrument(skip(pool, update))]
pub async fn update_organization(
    pool: &PgPool,
    organization_id: i64,
    update: &OrganizationUpdate,
) -> Result<Organization> {
    let client = pool.get().await?;
    if let Some(industry_id) = update.industry_id {
        ensure_active_industry(&client, industry_id).await?;
    }
    let social_links = update.social_links.as_ref().map(Json);
    let email = update.email.as_deref().map(|e| e.trim().to_lowercase());
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.organizations SET
                    name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    logo = COALESCE($4, logo),
                    cover_image = COALESCE($5, cover_image),
                    industry_id = COALESCE($6, industry_id),
                    address = COALESCE($7, address),
                    province_code = COALESCE($8, province_code),
                    district_code = COALESCE($9, district_code),
                    ward_code = COALESCE($10, ward_code),
                    latitude = COALESCE($11, latitude),
                    longitude = COALESCE($12, longitude),
                    contact_phone = COALESCE($13, contact_phone),
                    email = COALESCE($14, email),
                    website = COALESCE($15, website),
                    social_links = COALESCE($16, social_links),
                    tax_code = COALESCE($17, tax_code),
                    updated_at = NOW()
                 WHERE id = $1 AND NOT is_deleted
                 RETURNING {ORGANIZATION_COLUMNS}"
            ),
            &[
                &organization_id,
                &update.name,
                &update.description,
                &update.logo,
                &update.cover_image,
                &update.industry_id,
                &update.address,
                &update.province_code,
                &update.district_code,
                &update.ward_code,
                &update.latitude,
                &update.longitude,
                &update.contact_phone,
                &email,
                &update.website,
                &social_links,
                &update.tax_code,
            ],
        )
        .await?
        .ok_or(OrganizationStorageError::NotFound(organization_id))?;
    row_to_organization(&row)
}

/// Soft delete. Live postings of the organization are closed.
#[instrument(skip(pool))]
pub async fn delete_organization(pool: &PgPool, organization_id: i64) -> Result<()> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    let updated = tx
        .execute(
            "UPDATE sb.organizations SET is_deleted = TRUE, is_active = FALSE, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
            &[&organization_id],
        )
        .await?;
    if updated == 0 {
        return Err(OrganizationStorageError::NotFound(organization_id));
    }
    let closed = tx
        .execute(
            "UPDATE sb.job_postings SET status = 'CLOSED', updated_at = NOW()
             WHERE organization_id = $1 AND status IN ('DRAFT', 'PUBLISHED')",
            &[&organization_id],
        )
        .await?;
    tx.commit().await?;
    info!(organization_id, closed_postings = closed, "organization deleted");
    Ok(())
}

async fn lock_verification_status(
    client: &impl GenericClient,
    organization_id: i64,
) -> Result<VerificationStatus> {
    let row = client
        .query_opt(
            "SELECT verification_status FROM sb.organizations
             WHERE id = $1 AND NOT is_deleted
             FOR UPDATE",
            &[&organization_id],
        )
        .await?
        .ok_or(OrganizationStorageError::NotFound(organization_id))?;
    parse_enum(&row, "verification_status").map_err(OrganizationStorageError::Mapping)
}

#[instrument(skip(pool, submission))]
pub async fn submit_verification(
    pool: &PgPool,
    organization_id: i64,
    submission: &VerificationSubmission,
) -> Result<Organization> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    if lock_verification_status(&tx, organization_id).await? == VerificationStatus::Verified {
        return Err(OrganizationStorageError::AlreadyVerified);
    }
    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.organizations
                 SET verification_status = 'PENDING', verification_documents = $2,
                     review_note = NULL, updated_at = NOW()
                 WHERE id = $1
                 RETURNING {ORGANIZATION_COLUMNS}"
            ),
            &[&organization_id, &Json(&submission.documents)],
        )
        .await?;
    tx.commit().await?;
    info!(organization_id, documents = submission.documents.len(), "verification submitted");
    row_to_organization(&row)
}

#[instrument(skip(pool, review))]
pub async fn review_verification(
    pool: &PgPool,
    organization_id: i64,
    review: &VerificationReview,
) -> Result<Organization> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    if lock_verification_status(&tx, organization_id).await? != VerificationStatus::Pending {
        return Err(OrganizationStorageError::NotPending);
    }
    let (status, level, note) = match review {
        VerificationReview::Approve { level } => (VerificationStatus::Verified, Some(level.as_i16()), None),
        VerificationReview::Reject { note } => (VerificationStatus::Rejected, None, Some(note.as_str())),
    };
    let row = tx
        .query_one(
            &format!(
                "UPDATE sb.organizations
                 SET verification_status = $2,
                     verification_level = COALESCE($3, verification_level),
                     review_note = $4,
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING {ORGANIZATION_COLUMNS}"
            ),
            &[&organization_id, &status.as_ref(), &level, &note],
        )
        .await?;
    tx.commit().await?;
    info!(organization_id, status = status.as_ref(), "verification reviewed");
    row_to_organization(&row)
}

fn row_to_member(row: &Row) -> Result<OrganizationMember> {
    Ok(OrganizationMember {
        organization_id: row.try_get("organization_id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_enum(row, "role").map_err(OrganizationStorageError::Mapping)?,
        created_at: row.try_get("created_at")?,
    })
}

/// Adds or re-roles a member. Only active employers can join.
#[instrument(skip(pool, member))]
pub async fn add_member(
    pool: &PgPool,
    organization_id: i64,
    member: &NewMember,
) -> Result<OrganizationMember> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    lock_verification_status(&tx, organization_id).await?;
    let role = active_role(&tx, member.user_id).await?;
    if role != Some(UserRole::Employer) {
        return Err(OrganizationStorageError::NotEmployer(member.user_id));
    }
    tx.execute(
        "INSERT INTO sb.organization_members (organization_id, user_id, role)
         VALUES ($1, $2, $3)
         ON CONFLICT (organization_id, user_id) DO UPDATE SET role = EXCLUDED.role",
        &[&organization_id, &member.user_id, &member.role.as_ref()],
    )
    .await?;
    let row = tx
        .query_one(
            "SELECT m.organization_id, m.user_id, u.name, u.email, m.role, m.created_at
             FROM sb.organization_members m
             JOIN sb.users u ON u.id = m.user_id
             WHERE m.organization_id = $1 AND m.user_id = $2",
            &[&organization_id, &member.user_id],
        )
        .await?;
    tx.commit().await?;
    row_to_member(&row)
}

#[instrument(skip(pool))]
pub async fn list_members(pool: &PgPool, organization_id: i64) -> Result<Vec<OrganizationMember>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT m.organization_id, m.user_id, u.name, u.email, m.role, m.created_at
             FROM sb.organization_members m
             JOIN sb.users u ON u.id = m.user_id
             WHERE m.organization_id = $1
             ORDER BY m.role, u.name, m.user_id",
            &[&organization_id],
        )
        .await?;
    rows.iter().map(row_to_member).collect()
}

#[instrument(skip(pool))]
pub async fn remove_member(pool: &PgPool, organization_id: i64, user_id: i64) -> Result<()> {
    let client = pool.get().await?;
    let owner: Option<i64> = client
        .query_opt(
            "SELECT owner_id FROM sb.organizations WHERE id = $1 AND NOT is_deleted",
            &[&organization_id],
        )
        .await?
        .map(|row| row.try_get("owner_id"))
        .transpose()?;
    match owner {
        None => return Err(OrganizationStorageError::NotFound(organization_id)),
        Some(owner_id) if owner_id == user_id => {
            return Err(OrganizationStorageError::CannotRemoveOwner)
        }
        Some(_) => {}
    }
    let deleted = client
        .execute(
            "DELETE FROM sb.organization_members WHERE organization_id = $1 AND user_id = $2",
            &[&organization_id, &user_id],
        )
        .await?;
    if deleted == 0 {
        return Err(OrganizationStorageError::MemberNotFound(user_id));
    }
    Ok(())
}

/// Membership role of `user_id`, `None` for non-members and deleted
/// organizations.
#[instrument(skip(pool))]
pub async fn member_role(
    pool: &PgPool,
    organization_id: i64,
    user_id: i64,
) -> Result<Option<MemberRole>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT m.role FROM sb.organization_members m
             JOIN sb.organizations o ON o.id = m.organization_id
             WHERE m.organization_id = $1 AND m.user_id = $2 AND NOT o.is_deleted",
            &[&organization_id, &user_id],
        )
        .await?;
    row.as_ref()
        .map(|r| parse_enum(r, "role").map_err(OrganizationStorageError::Mapping))
        .transpose()
}
