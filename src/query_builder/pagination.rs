//! Pagination primitives.
//!
//! Offset pagination math and the external envelope shapes. Query
//! execution lives in [`crate::collection::Collection`]; everything here is
//! pure and unit-testable.

use serde::Serialize;

use crate::error::{QuarryError, Result};
use crate::value::Value;

/// Offset-pagination metadata. Serializes as the `pagination` object of
/// the external envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub from: i64,
    pub to: i64,
}

impl PageMeta {
    /// Compute metadata for one fetched page. `page < 1` and `limit < 1`
    /// clamp to 1; an empty total still reports one page.
    pub fn compute(total: i64, page: i64, limit: i64, records_on_page: usize) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = (page - 1) * limit;
        let total_pages = if total == 0 {
            1
        } else {
            (total + limit - 1) / limit
        };
        let records_on_page = records_on_page as i64;
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
            from: if records_on_page == 0 { 0 } else { offset + 1 },
            to: offset + records_on_page,
        }
    }
}

/// One page of records plus metadata; serializes as
/// `{"data": [...], "pagination": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    #[serde(rename = "data")]
    pub records: Vec<T>,
    pub pagination: PageMeta,
}

/// Cursor-pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorMeta {
    pub limit: i64,
    pub next_cursor: Option<Value>,
    pub prev_cursor: Option<Value>,
}

/// One keyset page; serializes as `{"data": [...], "pagination": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    #[serde(rename = "data")]
    pub records: Vec<T>,
    pub pagination: CursorMeta,
}

/// Parameters for keyset pagination. `after` and `before` are mutually
/// exclusive; the cursor column defaults to the descriptor's primary key.
#[derive(Debug, Clone, Default)]
pub struct CursorParams {
    pub after: Option<Value>,
    pub before: Option<Value>,
    pub limit: i64,
    pub cursor_column: Option<String>,
}

impl CursorParams {
    pub fn new(limit: i64) -> Self {
        Self {
            after: None,
            before: None,
            limit,
            cursor_column: None,
        }
    }

    pub fn after(mut self, cursor: impl Into<Value>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<Value>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn cursor_column(mut self, column: impl Into<String>) -> Self {
        self.cursor_column = Some(column.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.after.is_some() && self.before.is_some() {
            return Err(QuarryError::usage(
                "cursor pagination accepts either `after` or `before`, not both",
            ));
        }
        Ok(())
    }
}
