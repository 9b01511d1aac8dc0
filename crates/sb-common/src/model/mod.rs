//! Row-level records shared by storage and the HTTP layer.

pub mod application;
pub mod catalog;
pub mod organization;
pub mod posting;
pub mod relationship;
pub mod shift;
pub mod user;
pub mod worker;

pub use application::Application;
pub use catalog::{Industry, Position};
pub use organization::{
    MemberRole, Organization, OrganizationLevel, OrganizationMember, SocialLink,
    VerificationDocument, VerificationStatus,
};
pub use posting::{Job, JobPosting, JobPostingStatus, Location};
pub use relationship::{RelationshipType, WorkerRelationship};
pub use shift::{GenderRequirement, ShiftDate, ShiftTemplateRecord};
pub use user::{User, UserRole};
pub use worker::{Gender, IdentityType, ProfileStatus, WorkerProfile};
