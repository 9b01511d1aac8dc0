use sb_common::api::Pagination;

use crate::error::ApiError;

const MAX_LIMIT: i64 = 100;
const MAX_OFFSET: i64 = 10_000;

pub fn validate_pagination(page: Pagination) -> Result<Pagination, ApiError> {
    if !(1..=MAX_LIMIT).contains(&page.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    if !(0..=MAX_OFFSET).contains(&page.offset) {
        return Err(ApiError::BadRequest(format!(
            "offset must be between 0 and {MAX_OFFSET}"
        )));
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(validate_pagination(Pagination { limit: 1, offset: 0 }).is_ok());
        assert!(validate_pagination(Pagination { limit: 100, offset: 10_000 }).is_ok());
        assert!(validate_pagination(Pagination { limit: 0, offset: 0 }).is_err());
        assert!(validate_pagination(Pagination { limit: 101, offset: 0 }).is_err());
        assert!(validate_pagination(Pagination { limit: 10, offset: -1 }).is_err());
    }
}
