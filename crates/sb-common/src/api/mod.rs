//! Request and response bodies shared by the API and storage layers.

pub mod applications;
pub mod catalog;
pub mod matching;
pub mod organizations;
pub mod pagination;
pub mod postings;
pub mod relationships;
pub mod shifts;
pub mod users;
pub mod workers;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use pagination::{ListResponse, Pagination};

/// A request body that is well-formed JSON but semantically invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static RE_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10,11}$").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_\-]{1,50}$").unwrap());

pub(crate) fn require_text(field: &str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError(format!("{field} must be at most {max_len} characters")));
    }
    Ok(())
}

pub(crate) fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max_len => Err(ValidationError(format!(
            "{field} must be at most {max_len} characters"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn require_email(value: &str) -> Result<(), ValidationError> {
    if RE_EMAIL.is_match(value.trim()) && value.len() <= 254 {
        Ok(())
    } else {
        Err(ValidationError::new("email is not a valid address"))
    }
}

pub(crate) fn require_phone(field: &str, value: &str) -> Result<(), ValidationError> {
    if RE_PHONE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError(format!("{field} must be 10 or 11 digits")))
    }
}

pub(crate) fn require_code(field: &str, value: &str) -> Result<(), ValidationError> {
    if RE_CODE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError(format!(
            "{field} must be 1-50 lowercase letters, digits, '_' or '-'"
        )))
    }
}

pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_and_phone_rules() {
        assert!(require_email("ops@example.vn").is_ok());
        assert!(require_email("no-at-sign").is_err());
        assert!(require_phone("phone", "0901234567").is_ok());
        assert!(require_phone("phone", "09012345678").is_ok());
        assert!(require_phone("phone", "090123").is_err());
        assert!(require_phone("phone", "+84901234567").is_err());
    }

    #[test]
    fn code_rules() {
        assert!(require_code("code", "food_service").is_ok());
        assert!(require_code("code", "Food").is_err());
        assert!(require_code("code", "").is_err());
    }

    #[test]
    fn text_rules_count_characters() {
        assert!(require_text("name", "  ", 10).is_err());
        assert!(require_text("name", "Phở Hà Nội", 10).is_ok());
        assert!(optional_text("note", Some("abcdef"), 5).is_err());
        assert!(optional_text("note", None, 5).is_ok());
    }
}
