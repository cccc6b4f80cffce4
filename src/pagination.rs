//! Pagination contracts for Tenable API responses.
//!
//! A [`Paginator`](crate::Paginator) is assembled from two strategies:
//!
//! - a [`PageFetcher`] that performs one network call for a given
//!   offset/limit and returns the raw page plus optional [`PaginationInfo`]
//! - a [`PageDecoder`] that turns the raw page into typed items, in order
//!
//! Endpoint bindings supply both; the paginator never knows whether it is
//! walking an offset-paged listing or the chunks of an export job.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TioError};

/// Pagination metadata reported alongside a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    /// Total number of items across all pages, if the backend knows it.
    ///
    /// Negative values on the wire are treated as unknown.
    #[serde(default, deserialize_with = "total_or_unknown")]
    pub total: Option<u64>,
    /// Page size the backend applied.
    #[serde(default)]
    pub limit: u32,
    /// Offset of the first item in this page.
    #[serde(default)]
    pub offset: u64,
}

impl PaginationInfo {
    /// Pagination info with a known total.
    #[must_use]
    pub fn new(total: u64, limit: u32, offset: u64) -> Self {
        Self {
            total: Some(total),
            limit,
            offset,
        }
    }

    /// Pagination info for a backend that has not reported a total.
    #[must_use]
    pub fn unknown_total(limit: u32, offset: u64) -> Self {
        Self {
            total: None,
            limit,
            offset,
        }
    }
}

fn total_or_unknown<'de, D>(deserializer: D) -> core::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|t| u64::try_from(t).ok()))
}

/// One page of raw results as returned by a [`PageFetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Raw page bytes, understood by the paired [`PageDecoder`].
    pub data: Vec<u8>,
    /// Pagination metadata, if the endpoint reports any.
    pub pagination: Option<PaginationInfo>,
}

impl FetchedPage {
    /// Create a page from raw bytes and pagination info.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, pagination: Option<PaginationInfo>) -> Self {
        Self {
            data: data.into(),
            pagination,
        }
    }

    /// A page with no items. Ends any paginator that receives it.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(b"[]".to_vec(), None)
    }

    /// Encode typed items as a JSON array page.
    ///
    /// # Errors
    ///
    /// Returns an error if the items cannot be serialized.
    pub fn from_items<T: Serialize>(items: &[T], pagination: Option<PaginationInfo>) -> Result<Self> {
        Ok(Self::new(serde_json::to_vec(items)?, pagination))
    }
}

/// Fetch strategy for a [`Paginator`](crate::Paginator).
///
/// Called with the offset of the next unseen item and the configured page
/// size. Implementations may be stateful (see
/// [`ExportCursor`](crate::jobs::ExportCursor)); the paginator calls them
/// sequentially from a single task.
#[async_trait]
pub trait PageFetcher: Send {
    /// Fetch the page starting at `offset`.
    ///
    /// # Errors
    ///
    /// Any error terminates the paginator.
    async fn fetch_page(
        &mut self,
        cancel: &CancellationToken,
        offset: u64,
        limit: u32,
    ) -> Result<FetchedPage>;
}

/// A [`PageFetcher`] backed by a closure.
///
/// Created with [`fetcher_fn`].
pub struct FnFetcher<F> {
    f: F,
}

/// Wrap a closure as a [`PageFetcher`].
///
/// The closure receives a clone of the paginator's cancellation token and
/// must return a `'static` future, so clone any client handles into it.
///
/// # Example
///
/// ```no_run
/// use tioapi::{fetcher_fn, FetchedPage, PaginationInfo};
///
/// let fetcher = fetcher_fn(|_cancel, offset, limit| async move {
///     let items: Vec<u64> = (offset..(offset + u64::from(limit)).min(10)).collect();
///     FetchedPage::from_items(&items, Some(PaginationInfo::new(10, limit, offset)))
/// });
/// ```
pub fn fetcher_fn<F, Fut>(f: F) -> FnFetcher<F>
where
    F: FnMut(CancellationToken, u64, u32) -> Fut + Send,
    Fut: Future<Output = Result<FetchedPage>> + Send + 'static,
{
    FnFetcher { f }
}

#[async_trait]
impl<F, Fut> PageFetcher for FnFetcher<F>
where
    F: FnMut(CancellationToken, u64, u32) -> Fut + Send,
    Fut: Future<Output = Result<FetchedPage>> + Send + 'static,
{
    async fn fetch_page(
        &mut self,
        cancel: &CancellationToken,
        offset: u64,
        limit: u32,
    ) -> Result<FetchedPage> {
        (self.f)(cancel.clone(), offset, limit).await
    }
}

/// Decode strategy for a [`Paginator`](crate::Paginator).
///
/// Must preserve the order of items as they appear in the page.
pub trait PageDecoder<T>: Send + Sync {
    /// Decode raw page bytes into items.
    ///
    /// # Errors
    ///
    /// Any error terminates the paginator.
    fn decode(&self, data: &[u8]) -> Result<Vec<T>>;
}

impl<T, F> PageDecoder<T> for F
where
    F: Fn(&[u8]) -> Result<Vec<T>> + Send + Sync,
{
    fn decode(&self, data: &[u8]) -> Result<Vec<T>> {
        self(data)
    }
}

/// Decodes a page holding a top-level JSON array.
///
/// Empty input and `null` decode to zero items.
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    /// Create a new JSON array decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder").finish()
    }
}

impl<T: DeserializeOwned> PageDecoder<T> for JsonDecoder<T> {
    fn decode(&self, data: &[u8]) -> Result<Vec<T>> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let items: Option<Vec<T>> = serde_json::from_slice(data)?;
        Ok(items.unwrap_or_default())
    }
}

/// Default page size for paginated requests.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Construction options for a [`Paginator`](crate::Paginator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatorOptions {
    /// Page size requested from the fetcher. Must be non-zero.
    pub limit: u32,
    /// Offset of the first item to fetch.
    pub offset: u64,
    /// Maximum number of pages to fetch; 0 means unlimited.
    pub max_pages: u32,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            max_pages: 0,
        }
    }
}

impl PaginatorOptions {
    /// Set the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the starting offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Cap the number of pages fetched.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(TioError::Validation {
                field: "limit",
                message: "page size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Run a future unless the token fires first.
///
/// # Errors
///
/// Returns [`TioError::Cancelled`] if the token is or becomes cancelled
/// before the future completes.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TioError::Cancelled),
        result = fut => result,
    }
}
