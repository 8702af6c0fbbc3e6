//! Pagination model shared by list screens and list query keys.
//!
//! `describe` is a pure function of `(page_number, page_size, total_count)`.
//! Inputs are validated once, when a `PageRequest` is constructed, so the
//! descriptor math never has to deal with zero or negative values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page number must be at least 1, got {0}")]
    PageNumber(i64),

    #[error("page size must be at least 1, got {0}")]
    PageSize(i64),
}

/// A validated `(pageNumber, pageSize)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page_number: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Result<Self, PageError> {
        let page_number = u32::try_from(page_number)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(PageError::PageNumber(page_number))?;
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(PageError::PageSize(page_size))?;
        Ok(Self {
            page_number,
            page_size,
        })
    }

    /// First page at the given size.
    pub fn first(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Changing the page size always returns to page 1: a page index computed
    /// against a different size points at different rows.
    pub fn with_page_size(self, page_size: u32) -> Self {
        Self::first(page_size)
    }

    pub fn with_page_number(self, page_number: u32) -> Self {
        Self {
            page_number: page_number.max(1),
            ..self
        }
    }

    /// Query-string pairs in the order the API documents them.
    pub fn to_query(&self) -> Vec<(String, String)> {
        vec![
            ("pageNumber".to_string(), self.page_number.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Derived pagination metadata for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub previous_page_number: u32,
    pub next_page_number: u32,
}

/// Describe one page of a collection.
///
/// There is always at least one page, even for an empty collection, so page
/// controls have something valid to show. Callers must pass positive
/// `page_number` and `page_size`.
pub fn describe(page_number: u32, page_size: u32, total_count: u64) -> PageDescriptor {
    debug_assert!(page_number >= 1 && page_size >= 1);
    let total_pages = total_count
        .div_ceil(u64::from(page_size.max(1)))
        .max(1)
        .min(u64::from(u32::MAX)) as u32;

    PageDescriptor {
        page_number,
        page_size,
        total_count,
        total_pages,
        has_next_page: page_number < total_pages,
        has_previous_page: page_number > 1,
        previous_page_number: page_number.saturating_sub(1).max(1),
        next_page_number: page_number.saturating_add(1).min(total_pages),
    }
}

/// One page of a collection, in the API's list envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub previous_page_number: u32,
    pub next_page_number: u32,
}

impl<T> PaginatedResult<T> {
    /// Build a page from raw items and a total count, deriving the rest.
    pub fn from_page(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        let d = describe(request.page_number(), request.page_size(), total_count);
        Self {
            items,
            total_count,
            page_number: d.page_number,
            page_size: d.page_size,
            total_pages: d.total_pages,
            has_next_page: d.has_next_page,
            has_previous_page: d.has_previous_page,
            previous_page_number: d.previous_page_number,
            next_page_number: d.next_page_number,
        }
    }

    /// Recompute the descriptor from the echoed count and parameters rather
    /// than trusting the server's derived fields.
    pub fn descriptor(&self) -> PageDescriptor {
        describe(self.page_number.max(1), self.page_size.max(1), self.total_count)
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::first(self.page_size).with_page_number(self.page_number)
    }
}
