//! Pagination types shared by every listing

use serde::{Deserialize, Serialize};

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 6,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamped to sane bounds
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * (self.per_page as i64)
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        (self.total.max(0) as u32).div_ceil(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamped() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);

        let params = ListParams::new(3, 0);
        assert_eq!(params.per_page, 1);
    }

    #[test]
    fn test_offset_and_limit() {
        let params = ListParams::new(3, 6);
        assert_eq!(params.offset(), 12);
        assert_eq!(params.limit(), 6);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 6);
        assert_eq!(PagedResult::<()>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<()>::new(vec![], 6, &params).total_pages(), 1);
        assert_eq!(PagedResult::<()>::new(vec![], 7, &params).total_pages(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Every item index lands on exactly one page within total_pages.
        #[test]
        fn pages_cover_all_items(total in 0i64..1000, per_page in 1u32..=100) {
            let params = ListParams::new(1, per_page);
            let result = PagedResult::<()>::new(vec![], total, &params);
            let pages = result.total_pages() as i64;

            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!((pages - 1).max(0) * (per_page as i64) < total.max(1));
        }
    }
}
