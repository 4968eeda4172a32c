//! Page/page-size windows over ordered collections.
//!
//! Page numbers below 1 are clamped to the first page. A non-positive page size
//! is rejected so client bugs are not masked; sizes above [`MAX_PAGE_SIZE`]
//! are clamped. Callers report the unwindowed total separately through
//! [`TOTAL_COUNT_HEADER`], and must hand in a source with a stable order.

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be positive")]
    PageSizeNotPositive,
}

impl IntoResponse for PaginationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Query string form: `?page=2&page_size=20`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// 1-based page number; values below 1 are treated as 1.
    pub page: Option<i64>,
    /// Records per page, 1 to 50 (default 10).
    pub page_size: Option<i64>,
}

impl PaginationQuery {
    /// # Errors
    /// Returns [`PaginationError::PageSizeNotPositive`] for `page_size <= 0`.
    pub fn resolve(&self) -> Result<Pagination, PaginationError> {
        Pagination::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    page_size: i64,
}

impl Pagination {
    /// # Errors
    /// Returns [`PaginationError::PageSizeNotPositive`] for `page_size <= 0`.
    pub fn new(page: i64, page_size: i64) -> Result<Self, PaginationError> {
        if page_size <= 0 {
            return Err(PaginationError::PageSizeNotPositive);
        }
        Ok(Self {
            page: page.max(1),
            page_size: page_size.min(MAX_PAGE_SIZE),
        })
    }

    #[must_use]
    pub const fn page(&self) -> i64 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Records to skip, saturating for absurd page numbers.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.page_size
    }

    /// The window of an in-memory slice, clipped to its length.
    #[must_use]
    pub fn window<'a, T>(&self, source: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset())
            .unwrap_or(usize::MAX)
            .min(source.len());
        let len = usize::try_from(self.limit()).unwrap_or(0);
        let end = start.saturating_add(len).min(source.len());
        &source[start..end]
    }

    /// Skip then take over any ordered iterator.
    #[must_use]
    pub fn paginate<I>(&self, source: I) -> Vec<I::Item>
    where
        I: IntoIterator,
    {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit()).unwrap_or(0);
        source.into_iter().skip(skip).take(take).collect()
    }
}

/// One window plus the cardinality of the whole source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

impl<T> Page<T> {
    /// Window a fully materialized source; total is taken before windowing.
    #[must_use]
    pub fn from_slice(source: &[T], pagination: Pagination) -> Self
    where
        T: Clone,
    {
        Self {
            total_count: i64::try_from(source.len()).unwrap_or(i64::MAX),
            items: pagination.window(source).to_vec(),
        }
    }

    /// Headers carrying the total count out of band.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        total_count_headers(self.total_count)
    }
}

#[must_use]
pub fn total_count_headers(total_count: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(TOTAL_COUNT_HEADER),
        HeaderValue::from(total_count),
    );
    headers
}
