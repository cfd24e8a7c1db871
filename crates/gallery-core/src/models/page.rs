use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub current: i64,
    pub page_size: i64,
    pub total: i64,
    pub records: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(current: i64, page_size: i64, total: i64, records: Vec<T>) -> Self {
        Self {
            current,
            page_size,
            total,
            records,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            current: self.current,
            page_size: self.page_size,
            total: self.total,
            records: self.records.into_iter().map(f).collect(),
        }
    }
}

/// Sort direction as sent by clients: `"ascend"` sorts ascending, anything else descending.
pub fn is_ascending(sort_order: Option<&str>) -> bool {
    matches!(sort_order, Some("ascend"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_defaults_to_descending() {
        assert!(is_ascending(Some("ascend")));
        assert!(!is_ascending(Some("descend")));
        assert!(!is_ascending(Some("ASC")));
        assert!(!is_ascending(None));
    }

    #[test]
    fn test_page_map_keeps_pagination() {
        let page = Page::new(2, 10, 13, vec![1, 2, 3]);
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.current, 2);
        assert_eq!(mapped.total, 13);
        assert_eq!(mapped.records, vec![10, 20, 30]);
    }
}
