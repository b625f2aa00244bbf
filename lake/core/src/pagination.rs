//! Page arithmetic shared by every paginated read.
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// A requested page. Pages are one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

/// Rows to read for a page: skip `offset`, take `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl PageRequest {
    /// Create a page request, clamping `page_size` to `[1, MAX_PAGE_SIZE]`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the rows covered by this page, or `None` if the page is
    /// outside `[1, total_pages]`.
    pub fn window(&self, total: u64) -> Option<PageWindow> {
        if u64::from(self.page) > total_pages(total, self.page_size) {
            return None;
        }
        self.offset_window()
    }

    /// Rows covered by this page without knowing the total. `None` for
    /// page 0.
    pub fn offset_window(&self) -> Option<PageWindow> {
        let page = self.page.checked_sub(1)?;
        let page_size = u64::from(self.page_size);
        Some(PageWindow {
            offset: u64::from(page) * page_size,
            limit: page_size,
        })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            page_size: request.page_size(),
            total_pages: total_pages(total, request.page_size()),
        }
    }

    pub fn empty(total: u64, request: PageRequest) -> Self {
        Self::new(Vec::new(), total, request)
    }
}

/// `ceil(total / page_size)`.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

/// Clamp the row limit of the "recent" reads to `[1, MAX_LIMIT]`.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::{clamp_limit, total_pages, PageRequest, PageWindow, MAX_PAGE_SIZE};

    #[test]
    pub fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(2, 1), 2);
    }

    #[test]
    pub fn test_window_outside_range() {
        assert_eq!(PageRequest::new(0, 10).window(100), None);
        assert_eq!(PageRequest::new(11, 10).window(100), None);
        assert_eq!(PageRequest::new(1, 10).window(0), None);
        assert_eq!(
            PageRequest::new(10, 10).window(100),
            Some(PageWindow {
                offset: 90,
                limit: 10
            })
        );
    }

    #[test]
    pub fn test_offset_window() {
        assert_eq!(PageRequest::new(0, 10).offset_window(), None);
        assert_eq!(
            PageRequest::new(3, 10).offset_window(),
            Some(PageWindow {
                offset: 20,
                limit: 10
            })
        );
    }

    #[test]
    pub fn test_page_size_is_clamped() {
        assert_eq!(PageRequest::new(1, 0).page_size(), 1);
        assert_eq!(PageRequest::new(1, 1000).page_size(), MAX_PAGE_SIZE);
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(5000), 100);
    }

    #[quickcheck]
    fn prop_pages_cover_all_rows(total: u16, page_size: u8) -> bool {
        let total = u64::from(total);
        let request_size = u32::from(page_size).clamp(1, MAX_PAGE_SIZE);
        let pages = total_pages(total, request_size);

        let mut covered = Vec::new();
        for page in 1..=pages {
            let Some(window) = PageRequest::new(page as u32, request_size).window(total) else {
                return false;
            };
            let end = (window.offset + window.limit).min(total);
            covered.extend(window.offset..end);
        }

        let past_end = PageRequest::new(pages as u32 + 1, request_size).window(total);
        covered == (0..total).collect::<Vec<_>>() && past_end.is_none()
    }
}
