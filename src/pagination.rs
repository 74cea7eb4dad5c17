/// Page requests and paged results shared by the list endpoints
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalised page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Parse loosely: missing or malformed values fall back to page 1 / 10 per page
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let page_size = page_size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Saturates for absurd page numbers; the store then returns an empty page
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.page_size - 1) / request.page_size
        };

        Self {
            data,
            pagination: Pagination {
                page: request.page,
                page_size: request.page_size,
                total,
                total_pages,
            },
        }
    }

    /// Result for a query that was never sent to the store
    pub fn empty(request: PageRequest) -> Self {
        Self::new(
            Vec::new(),
            PageRequest {
                page: 1,
                page_size: request.page_size,
            },
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_and_clamps() {
        assert_eq!(PageRequest::parse(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::parse(Some("0"), Some("1000")),
            PageRequest {
                page: 1,
                page_size: MAX_PAGE_SIZE
            }
        );
        assert_eq!(
            PageRequest::parse(Some("abc"), Some("25")),
            PageRequest {
                page: 1,
                page_size: 25
            }
        );
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest::parse(Some("2"), Some("10"));
        let page: Page<i64> = Page::new(vec![], request, 21);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(request.offset(), 10);
    }

    #[test]
    fn test_offset_saturates_on_huge_page() {
        let request = PageRequest::parse(Some("9223372036854775807"), Some("10"));
        assert_eq!(request.page, i64::MAX);
        assert_eq!(request.offset(), i64::MAX);

        let request = PageRequest::parse(Some("922337203685477580"), Some("100"));
        assert_eq!(request.offset(), i64::MAX);
        assert_eq!(request.limit(), 100);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i64> = Page::empty(PageRequest::parse(Some("4"), Some("20")));
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.total, 0);
        assert_eq!(page.pagination.total_pages, 0);
        assert!(page.data.is_empty());
    }
}
