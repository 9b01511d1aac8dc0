use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    /// Rows to fetch: one extra to learn whether another page exists.
    pub fn probe_limit(&self) -> i64 {
        self.limit + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl<T> ListResponse<T> {
    /// Builds a page from rows fetched with [`Pagination::probe_limit`].
    pub fn from_probe(mut items: Vec<T>, page: Pagination) -> Self {
        let has_more = items.len() as i64 > page.limit;
        items.truncate(page.limit.max(0) as usize);
        Self {
            items,
            limit: page.limit,
            offset: page.offset,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResponse<U> {
        ListResponse {
            items: self.items.into_iter().map(f).collect(),
            limit: self.limit,
            offset: self.offset,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_row_sets_has_more() {
        let page = Pagination { limit: 2, offset: 4 };
        let list = ListResponse::from_probe(vec![1, 2, 3], page);
        assert_eq!(list.items, vec![1, 2]);
        assert!(list.has_more);
        assert_eq!(list.offset, 4);

        let last = ListResponse::from_probe(vec![1], page);
        assert!(!last.has_more);
    }

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let page: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Pagination { limit: 10, offset: 0 });
    }
}
