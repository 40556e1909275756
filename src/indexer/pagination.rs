use serde::Serialize;

/// Page metadata returned alongside every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    /// `ceil(total / limit)`.
    pub pages: u64,
}

/// A requested page. Zero values fall back to page 1 and the default limit,
/// the same way a missing or unparsable query parameter would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        let page = page.filter(|&p| p > 0).unwrap_or(1);
        let limit = limit.filter(|&l| l > 0).unwrap_or(default_limit.max(1));
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1).saturating_mul(self.limit)) as usize
    }

    pub fn limit(&self) -> usize {
        self.limit as usize
    }

    pub fn paginate(&self, total: u64) -> Pagination {
        Pagination { page: self.page, limit: self.limit, total, pages: total.div_ceil(self.limit) }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
