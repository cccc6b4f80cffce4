//! Lazy, pull-based iteration over paged API results.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TioError};
use crate::pagination::{PageDecoder, PageFetcher, PaginatorOptions};

/// A lazy sequence of items backed by successive page fetches.
///
/// Pages are requested on demand: the first call to [`advance`] fetches the
/// first page, and later calls fetch the next page only once the current one
/// is used up. At most one page is buffered at a time.
///
/// The sequence is fail-stop. A fetch or decode error is recorded, the
/// sequence terminates, and the same error is reported by [`error`] and by
/// every bulk consumer from then on. Nothing is retried here.
///
/// It terminates cleanly when the consumed count reaches a known total, when
/// a page comes back empty, or when the configured page cap is reached.
///
/// # Example
///
/// ```no_run
/// use tioapi::{Asset, AssetListQuery, List, TioClient};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> tioapi::Result<()> {
/// let client = TioClient::from_env()?;
/// let mut assets = Asset::list(&client, AssetListQuery::default(), CancellationToken::new())?;
///
/// while assets.advance().await {
///     if let Some(asset) = assets.current() {
///         println!("{}", asset.id);
///     }
/// }
/// if let Some(err) = assets.error() {
///     eprintln!("listing stopped: {err}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`advance`]: Paginator::advance
/// [`error`]: Paginator::error
pub struct Paginator<T> {
    fetcher: Box<dyn PageFetcher>,
    decoder: Box<dyn PageDecoder<T>>,
    cancel: CancellationToken,
    limit: u32,
    offset: u64,
    total: Option<u64>,
    page: std::vec::IntoIter<T>,
    current: Option<T>,
    consumed: u64,
    max_pages: u32,
    pages_fetched: u32,
    terminated: bool,
    error: Option<TioError>,
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("total", &self.total)
            .field("consumed", &self.consumed)
            .field("pages_fetched", &self.pages_fetched)
            .field("terminated", &self.terminated)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> Paginator<T> {
    /// Create a paginator from a fetch and a decode strategy.
    ///
    /// No request is made until the first [`advance`](Self::advance).
    ///
    /// # Errors
    ///
    /// Returns [`TioError::Validation`] if `options.limit` is zero.
    pub fn new<F, D>(
        fetcher: F,
        decoder: D,
        cancel: CancellationToken,
        options: PaginatorOptions,
    ) -> Result<Self>
    where
        F: PageFetcher + 'static,
        D: PageDecoder<T> + 'static,
    {
        options.validate()?;

        Ok(Self {
            fetcher: Box::new(fetcher),
            decoder: Box::new(decoder),
            cancel,
            limit: options.limit,
            offset: options.offset,
            total: None,
            page: Vec::new().into_iter(),
            current: None,
            consumed: 0,
            max_pages: options.max_pages,
            pages_fetched: 0,
            terminated: false,
            error: None,
        })
    }

    /// Move to the next item, fetching a page if needed.
    ///
    /// Returns `true` if an item is now available from
    /// [`current`](Self::current). Once this returns `false` it keeps
    /// returning `false` without making further requests.
    pub async fn advance(&mut self) -> bool {
        if self.terminated {
            return false;
        }

        if let Some(total) = self.total {
            if self.consumed >= total {
                self.finish("total reached");
                return false;
            }
        }

        if self.page.as_slice().is_empty() && !self.load_next_page().await {
            return false;
        }

        match self.page.next() {
            Some(item) => {
                self.current = Some(item);
                self.consumed += 1;
                true
            }
            None => {
                self.finish("page exhausted");
                false
            }
        }
    }

    /// The most recently advanced-to item.
    ///
    /// `None` before the first successful advance, and after the item has
    /// been handed out by a bulk consumer.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The error that terminated the sequence, if any.
    pub fn error(&self) -> Option<&TioError> {
        self.error.as_ref()
    }

    /// Total number of items reported by the backend, if known.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Number of items yielded so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Offset the next page will be requested at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of non-empty pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Returns true once the sequence will yield no more items.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Collect every remaining item.
    ///
    /// # Errors
    ///
    /// Returns the sequence error if one occurred, now or earlier.
    pub async fn drain_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while self.advance().await {
            items.extend(self.current.take());
        }
        self.result(items)
    }

    /// Collect up to `n` remaining items.
    ///
    /// Stopping after `n` items is not an error and leaves the sequence
    /// usable.
    ///
    /// # Errors
    ///
    /// Returns the sequence error if one occurred, now or earlier.
    pub async fn drain_up_to(&mut self, n: usize) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(n.min(self.limit as usize));
        while items.len() < n && self.advance().await {
            items.extend(self.current.take());
        }
        self.result(items)
    }

    /// Hand each remaining item to `visitor`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the visitor's error if it fails, otherwise the sequence error
    /// if one occurred.
    pub async fn for_each<V>(&mut self, mut visitor: V) -> Result<()>
    where
        V: FnMut(T) -> Result<()>,
    {
        while self.advance().await {
            if let Some(item) = self.current.take() {
                visitor(item)?;
            }
        }
        self.result(())
    }

    /// Turn the sequence into a [`Stream`] of results.
    ///
    /// The stream ends after yielding the sequence error, if any.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send
    where
        T: Send + 'static,
    {
        futures::stream::unfold(Some(self), |state| async move {
            let mut paginator = state?;
            if paginator.advance().await {
                let item = paginator.current.take()?;
                Some((Ok(item), Some(paginator)))
            } else {
                paginator.error.clone().map(|err| (Err(err), None))
            }
        })
    }

    /// Publish items onto a bounded channel from a background task.
    ///
    /// The channel closes exactly once: after the last item, or right after
    /// the first error is delivered. The producer stops early if the
    /// paginator's cancellation token fires (delivering
    /// [`TioError::Cancelled`] when there is room) or if the receiver is
    /// dropped, so it never outlives an abandoned consumer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn into_channel(self, capacity: usize) -> mpsc::Receiver<Result<T>>
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut paginator = self;

            loop {
                let more = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = tx.try_send(Err(TioError::Cancelled));
                        break;
                    }
                    more = paginator.advance() => more,
                };

                let message = match (more, paginator.current.take()) {
                    (true, Some(item)) => Ok(item),
                    (true, None) => continue,
                    (false, _) => match paginator.error.clone() {
                        Some(err) => Err(err),
                        None => break,
                    },
                };
                let is_error = message.is_err();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = tx.send(message) => {
                        if sent.is_err() {
                            tracing::debug!("Paginator channel receiver dropped");
                            break;
                        }
                    }
                }

                if is_error {
                    break;
                }
            }
            // tx drops here, closing the channel
        });

        rx
    }

    async fn load_next_page(&mut self) -> bool {
        if self.max_pages > 0 && self.pages_fetched >= self.max_pages {
            self.finish("page cap reached");
            return false;
        }

        if let Some(total) = self.total {
            if self.offset >= total {
                self.finish("offset past total");
                return false;
            }
        }

        if self.cancel.is_cancelled() {
            self.fail(TioError::Cancelled);
            return false;
        }

        tracing::debug!(
            offset = self.offset,
            limit = self.limit,
            page = self.pages_fetched + 1,
            "Fetching page"
        );

        let fetched = match self
            .fetcher
            .fetch_page(&self.cancel, self.offset, self.limit)
            .await
        {
            Ok(fetched) => fetched,
            Err(err) => {
                self.fail(err);
                return false;
            }
        };

        if let Some(reported) = fetched.pagination.and_then(|p| p.total) {
            // Never let a later page shrink a total we already trust.
            self.total = Some(self.total.map_or(reported, |known| known.max(reported)));
        }

        let items = match self.decoder.decode(&fetched.data) {
            Ok(items) => items,
            Err(err) => {
                self.fail(err);
                return false;
            }
        };

        if items.is_empty() {
            self.finish("empty page");
            return false;
        }

        self.offset += items.len() as u64;
        self.pages_fetched += 1;
        self.page = items.into_iter();
        true
    }

    fn finish(&mut self, reason: &'static str) {
        tracing::debug!(
            reason,
            consumed = self.consumed,
            pages = self.pages_fetched,
            "Pagination finished"
        );
        self.terminated = true;
        self.page = Vec::new().into_iter();
    }

    fn fail(&mut self, err: TioError) {
        tracing::debug!(error = %err, consumed = self.consumed, "Pagination failed");
        self.error = Some(err);
        self.terminated = true;
        self.page = Vec::new().into_iter();
    }

    fn result<R>(&self, value: R) -> Result<R> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(value),
        }
    }
}
