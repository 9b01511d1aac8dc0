/// Declares a storage error enum carrying the pool and postgres variants
/// every storage module needs, plus the module's own domain variants.
macro_rules! db_error {
    ($name:ident { $($body:tt)* }) => {
        #[derive(Debug, thiserror::Error)]
        pub enum $name {
            #[error("failed to get postgres connection: {0}")]
            Pool(#[from] deadpool_postgres::PoolError),
            #[error("postgres error: {0}")]
            Postgres(#[from] tokio_postgres::Error),
            $($body)*
        }
    };
}
pub(crate) use db_error;

pub mod applications;
pub mod industries;
pub mod matching;
pub mod migrations;
pub mod organizations;
pub mod ownership;
pub mod pool;
pub mod positions;
pub mod postings;
pub mod relationships;
pub mod shifts;
mod snapshots;
pub mod users;
pub mod util;
pub mod workers;

pub use applications::{
    apply_to_shift, decide_application, get_application, list_shift_applications,
    list_worker_applications, ActorRef, ApplicationStorageError,
};
pub use industries::{
    create_industry, delete_industry, get_industry, list_industries, update_industry,
    IndustryStorageError,
};
pub use matching::{eligible_shifts_for_worker, find_candidates, MatchingStorageError};
pub use migrations::{run_migrations, MigrationError};
pub use organizations::{
    add_member, create_organization, delete_organization, get_organization,
    get_organization_by_slug, list_members, list_organizations, member_role, remove_member,
    review_verification, submit_verification, update_organization, OrganizationStorageError,
};
pub use ownership::{organization_of, OwnedResource, OwnershipError};
pub use pool::{create_pool_from_url, create_pool_from_url_checked, DbPoolError, PgPool};
pub use positions::{
    create_position, get_position, list_positions, update_position, PositionStorageError,
};
pub use postings::{
    cancel_stale_pending_applications, close_posting, create_posting, expire_postings,
    get_posting, list_organization_postings, list_published_postings, publish_posting,
    update_posting, PostingStorageError,
};
pub use relationships::{
    delete_relationship, get_relationship, list_relationships, upsert_relationship,
    RelationshipStorageError,
};
pub use shifts::{
    create_template, delete_shift_date, expand_template, list_posting_shifts, list_templates,
    update_shift_demand, ShiftStorageError,
};
pub use users::{create_user, get_user, set_user_active, update_user_profile, UserStorageError};
pub use workers::{
    create_worker_profile, get_worker_profile, replace_availability, review_identity,
    set_worker_status, submit_identity, update_worker_preferences, WorkerStorageError,
};
