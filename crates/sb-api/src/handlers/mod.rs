pub mod access;
pub mod applications;
pub mod catalog;
pub mod health;
pub mod matching;
pub mod organizations;
pub mod pagination;
pub mod postings;
pub mod relationships;
pub mod shifts;
pub mod users;
pub mod workers;
