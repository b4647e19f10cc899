use crate::contract::model::PageMeta;
use crate::domain::error::DomainError;

/// Offset page window. Both values are floored at 1 and the resulting
/// offset always fits in an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(
        page: Option<i64>,
        page_size: Option<i64>,
        default_size: u64,
        max_size: u64,
    ) -> Result<Self, DomainError> {
        let page = page.unwrap_or(1).max(1) as u64;
        let page_size = page_size.map(|s| s.max(1) as u64).unwrap_or(default_size);
        if page_size > max_size {
            return Err(DomainError::validation(
                "pageSize",
                format!("must be at most {max_size}"),
            ));
        }
        let in_range = (page - 1)
            .checked_mul(page_size)
            .is_some_and(|skip| skip <= i64::MAX as u64);
        if !in_range {
            return Err(DomainError::validation("page", "is out of range"));
        }
        Ok(Self { page, page_size })
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }

    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages(total),
        }
    }
}

/// Cursor and search limits: default when absent, clamped to `[1, max]`.
pub fn clamp_limit(raw: Option<i64>, default: u64, max: u64) -> u64 {
    match raw {
        Some(v) => v.clamp(1, max.max(1) as i64) as u64,
        None => default.clamp(1, max.max(1)),
    }
}
