use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument};

use crate::api::users::{NewUser, UserProfileUpdate};
use crate::db::util::{parse_enum, unique_violation};
use crate::db::{db_error, PgPool};
use crate::model::{User, UserRole};

db_error!(UserStorageError {
    #[error("user not found: {0}")]
    NotFound(i64),
    #[error("email is already registered")]
    EmailTaken,
    #[error("phone number is already registered")]
    PhoneTaken,
    #[error("unexpected user row: {0}")]
    Mapping(String),
});

const USER_COLUMNS: &str =
    "id, role, name, email, phone, avatar, is_verified, is_active, created_at, updated_at";

pub(crate) fn row_to_user(row: &Row) -> Result<User, UserStorageError> {
    Ok(User {
        id: row.try_get("id")?,
        role: parse_enum(row, "role").map_err(UserStorageError::Mapping)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        avatar: row.try_get("avatar")?,
        is_verified: row.try_get("is_verified")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_unique(err: tokio_postgres::Error) -> UserStorageError {
    match unique_violation(&err) {
        Some("uq_users_email") => UserStorageError::EmailTaken,
        Some("uq_users_phone") => UserStorageError::PhoneTaken,
        _ => UserStorageError::Postgres(err),
    }
}

#[instrument(skip(pool, user), fields(role = user.role.as_ref()))]
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User, UserStorageError> {
    let client = pool.get().await?;
    let email = user.normalized_email();
    let phone = user.phone.as_deref().map(str::trim);
    let row = client
        .query_one(
            &format!(
                "INSERT INTO sb.users (role, name, email, phone, avatar)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {USER_COLUMNS}"
            ),
            &[&user.role.as_ref(), &user.name.trim(), &email, &phone, &user.avatar],
        )
        .await
        .map_err(map_unique)?;

    let created = row_to_user(&row)?;
    info!(user_id = created.id, "user created");
    Ok(created)
}

pub(crate) async fn fetch_user(
    client: &impl GenericClient,
    user_id: i64,
) -> Result<Option<User>, UserStorageError> {
    let row = client
        .query_opt(
            &format!("SELECT {USER_COLUMNS} FROM sb.users WHERE id = $1"),
            &[&user_id],
        )
        .await?;
    row.as_ref().map(row_to_user).transpose()
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &PgPool, user_id: i64) -> Result<Option<User>, UserStorageError> {
    let client = pool.get().await?;
    fetch_user(&client, user_id).await
}

#[instrument(skip(pool, update))]
pub async fn update_user_profile(
    pool: &PgPool,
    user_id: i64,
    update: &UserProfileUpdate,
) -> Result<User, UserStorageError> {
    let client = pool.get().await?;
    let name = update.name.as_deref().map(str::trim);
    let phone = update.phone.as_deref().map(str::trim);
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.users
                 SET name = COALESCE($2, name),
                     phone = COALESCE($3, phone),
                     avatar = COALESCE($4, avatar),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING {USER_COLUMNS}"
            ),
            &[&user_id, &name, &phone, &update.avatar],
        )
        .await
        .map_err(map_unique)?
        .ok_or(UserStorageError::NotFound(user_id))?;
    row_to_user(&row)
}

#[instrument(skip(pool))]
pub async fn set_user_active(
    pool: &PgPool,
    user_id: i64,
    is_active: bool,
) -> Result<User, UserStorageError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE sb.users SET is_active = $2, updated_at = NOW()
                 WHERE id = $1
                 RETURNING {USER_COLUMNS}"
            ),
            &[&user_id, &is_active],
        )
        .await?
        .ok_or(UserStorageError::NotFound(user_id))?;
    info!(user_id, is_active, "user activation changed");
    row_to_user(&row)
}

/// Role of an active user, or `None` when unknown or deactivated.
pub(crate) async fn active_role(
    client: &impl GenericClient,
    user_id: i64,
) -> Result<Option<UserRole>, tokio_postgres::Error> {
    let row = client
        .query_opt(
            "SELECT role FROM sb.users WHERE id = $1 AND is_active",
            &[&user_id],
        )
        .await?;
    Ok(row.and_then(|r| parse_enum(&r, "role").ok()))
}
