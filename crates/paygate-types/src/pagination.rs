//! Pagination envelope shared by every listing operation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "PaginationParams::default_page")]
    pub page: u32,
    #[serde(default = "PaginationParams::default_per_page")]
    pub per_page: u32,
}

impl PaginationParams {
    fn default_page() -> u32 {
        1
    }

    fn default_per_page() -> u32 {
        20
    }

    pub fn offset(&self) -> i64 {
        ((self.page.max(1) - 1) as i64) * self.per_page.max(1) as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page.max(1) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        PaginationParams {
            page: Self::default_page(),
            per_page: Self::default_per_page(),
        }
    }
}

/// `{items, page, per_page, total, pages, has_next, has_prev}` — the shape
/// every paginated listing operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PaginationParams, total: u64) -> Self {
        let per_page = params.per_page.max(1);
        let pages = ((total as f64) / per_page as f64).ceil() as u32;
        let pages = pages.max(1);
        Page {
            items,
            page: params.page.max(1),
            per_page,
            total,
            pages,
            has_next: params.page < pages,
            has_prev: params.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_prev() {
        let page = Page::new(vec![1, 2, 3], PaginationParams { page: 1, per_page: 20 }, 45);
        assert_eq!(page.pages, 3);
        assert!(!page.has_prev);
        assert!(page.has_next);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::new(vec![1], PaginationParams { page: 3, per_page: 20 }, 45);
        assert_eq!(page.pages, 3);
        assert!(page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn empty_result_set_still_reports_one_page() {
        let page: Page<i32> = Page::new(vec![], PaginationParams { page: 1, per_page: 20 }, 0);
        assert_eq!(page.pages, 1);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn offset_and_limit_follow_page_and_per_page() {
        let params = PaginationParams { page: 3, per_page: 10 };
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }
}
