//! List trait for fetching collections of entities.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::client::TioClient;
use crate::error::Result;
use crate::pagination::{cancellable, fetcher_fn, FetchedPage, JsonDecoder, PaginatorOptions};
use crate::paginator::Paginator;

/// Maximum pages fetched by [`List::list_all`] (safety limit).
const MAX_PAGES: u32 = 1000;

/// List/filter entities through an offset-paged endpoint.
///
/// Implementors only describe how to fetch one raw page; [`list`] turns
/// that into a lazy [`Paginator`].
///
/// # Example
///
/// ```ignore
/// use tioapi::{Asset, List, TioClient};
///
/// let client = TioClient::from_env()?;
///
/// // Lazily iterate
/// let mut assets = Asset::list(&client, Default::default(), CancellationToken::new())?;
/// while assets.advance().await { /* ... */ }
///
/// // Or collect everything
/// let all_assets = Asset::list_all(&client, &Default::default()).await?;
/// ```
///
/// [`list`]: List::list
#[async_trait]
pub trait List: DeserializeOwned + Send + 'static {
    /// Query parameters for filtering.
    type Query: Default + Clone + Send + Sync + 'static;

    /// Fetch the page of items starting at `offset`.
    ///
    /// The returned page holds a JSON array of items plus whatever
    /// pagination metadata the endpoint reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_page(
        client: &TioClient,
        query: &Self::Query,
        offset: u64,
        limit: u32,
    ) -> Result<FetchedPage>;

    /// Lazily list entities matching the query with default paging.
    ///
    /// # Errors
    ///
    /// See [`list_with_options`](Self::list_with_options).
    fn list(
        client: &TioClient,
        query: Self::Query,
        cancel: CancellationToken,
    ) -> Result<Paginator<Self>> {
        Self::list_with_options(client, query, cancel, PaginatorOptions::default())
    }

    /// Lazily list entities matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`TioError::Validation`](crate::TioError::Validation) for a
    /// zero page size.
    fn list_with_options(
        client: &TioClient,
        query: Self::Query,
        cancel: CancellationToken,
        options: PaginatorOptions,
    ) -> Result<Paginator<Self>> {
        let client = client.clone();
        let fetcher = fetcher_fn(move |cancel, offset, limit| {
            let client = client.clone();
            let query = query.clone();
            // Dropping the request future also drops any pending retry backoff.
            async move {
                cancellable(&cancel, Self::list_page(&client, &query, offset, limit)).await
            }
        });
        Paginator::new(fetcher, JsonDecoder::<Self>::new(), cancel, options)
    }

    /// List all entities matching the query (fetches all pages).
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    async fn list_all(client: &TioClient, query: &Self::Query) -> Result<Vec<Self>> {
        let options = PaginatorOptions::default().with_max_pages(MAX_PAGES);
        let mut items =
            Self::list_with_options(client, query.clone(), CancellationToken::new(), options)?;
        let all_items = items.drain_all().await?;

        if items.pages_fetched() >= MAX_PAGES {
            tracing::warn!(
                "Reached pagination limit of {} pages, stopping",
                MAX_PAGES
            );
        }

        Ok(all_items)
    }
}
