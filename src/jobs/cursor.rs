//! Page-fetch adapter that walks the chunks of one export job.

use async_trait::async_trait;
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TioError};
use crate::jobs::backend::JobBackend;
use crate::jobs::poller::ExportPoller;
use crate::jobs::status::{ExportState, ExportStatus, JobPhase};
use crate::pagination::{FetchedPage, PageFetcher};

/// State of one export consumed as a sequence of pages.
///
/// The first fetch submits the job and waits for it to finish; each later
/// fetch returns the next available chunk; once every chunk has been
/// returned it hands back empty pages. Offsets and limits from the
/// paginator are ignored since chunks are addressed by identifier.
///
/// The job is submitted at most once per cursor. A failure while waiting is
/// remembered and returned again instead of polling a dead job.
pub struct ExportCursor<B: JobBackend> {
    poller: ExportPoller<B>,
    request: B::Request,
    job_id: Option<String>,
    status: Option<ExportStatus>,
    phase: JobPhase,
    next_chunk: usize,
    failure: Option<TioError>,
}

impl<B: JobBackend> std::fmt::Debug for ExportCursor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCursor")
            .field("job_id", &self.job_id)
            .field("phase", &self.phase)
            .field("next_chunk", &self.next_chunk)
            .finish_non_exhaustive()
    }
}

impl<B: JobBackend> ExportCursor<B> {
    /// A cursor that will submit `request` on its first fetch.
    pub fn new(poller: ExportPoller<B>, request: B::Request) -> Self {
        Self {
            poller,
            request,
            job_id: None,
            status: None,
            phase: JobPhase::NotSubmitted,
            next_chunk: 0,
            failure: None,
        }
    }

    /// Identifier of the submitted job, once submitted.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Current phase of the job.
    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Final status of the job, once it is ready.
    pub fn status(&self) -> Option<&ExportStatus> {
        self.status.as_ref()
    }

    /// Number of chunks not yet returned. Zero until the job is ready.
    pub fn chunks_remaining(&self) -> usize {
        self.status
            .as_ref()
            .map_or(0, |s| s.chunks_available.len().saturating_sub(self.next_chunk))
    }

    /// Fetch the next chunk, submitting and waiting first if needed.
    ///
    /// # Errors
    ///
    /// Returns submit, wait and chunk errors unchanged.
    pub async fn next_chunk(&mut self, cancel: &CancellationToken) -> Result<FetchedPage> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let job_id = match &self.job_id {
            Some(id) => id.clone(),
            None => {
                let id = self.poller.submit(cancel, &self.request).await?;
                self.phase = self.phase.submitted();
                self.job_id = Some(id.clone());
                id
            }
        };

        if self.status.is_none() {
            match self.poller.wait_until_ready(cancel, &job_id).await {
                Ok(status) => {
                    self.phase = self.phase.observe(status.status);
                    self.status = Some(status);
                }
                Err(err) => {
                    match &err {
                        TioError::Cancelled => self.phase = self.phase.abort(),
                        TioError::JobCancelled { .. } => {
                            self.phase = self.phase.observe(ExportState::Cancelled);
                        }
                        TioError::JobFailed { .. } => {
                            self.phase = self.phase.observe(ExportState::Error);
                        }
                        _ => {}
                    }
                    if self.phase.is_terminal() {
                        self.failure = Some(err.clone());
                    }
                    return Err(err);
                }
            }
        }

        // An empty page ends the sequence, so chunks with no records are
        // skipped rather than returned.
        loop {
            let chunk_id = match self
                .status
                .as_ref()
                .and_then(|s| s.chunks_available.get(self.next_chunk))
            {
                Some(id) => *id,
                None => return Ok(FetchedPage::empty()),
            };

            let data = self.poller.fetch_chunk(cancel, &job_id, chunk_id).await?;
            self.next_chunk += 1;

            if is_empty_chunk(&data) {
                tracing::debug!(job_id = %job_id, chunk_id, "Skipping empty export chunk");
                continue;
            }
            return Ok(FetchedPage::new(data, None));
        }
    }
}

/// True if a chunk holds no records: blank, `null` or an empty array.
///
/// Malformed chunks are not empty; the page decoder reports them.
fn is_empty_chunk(data: &[u8]) -> bool {
    if data.iter().all(u8::is_ascii_whitespace) {
        return true;
    }
    match serde_json::from_slice::<Option<Vec<IgnoredAny>>>(data) {
        Ok(records) => records.map_or(true, |r| r.is_empty()),
        Err(_) => false,
    }
}

#[async_trait]
impl<B> PageFetcher for ExportCursor<B>
where
    B: JobBackend + 'static,
    B::Request: 'static,
{
    async fn fetch_page(
        &mut self,
        cancel: &CancellationToken,
        _offset: u64,
        _limit: u32,
    ) -> Result<FetchedPage> {
        self.next_chunk(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde::Deserialize;

    use super::*;
    use crate::jobs::poller::PollerOptions;
    use crate::jobs::testing::ScriptedBackend;
    use crate::paginator::Paginator;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Finding {
        chunk: u64,
        n: u32,
    }

    fn fast() -> PollerOptions {
        PollerOptions::default().with_poll_interval(Duration::from_millis(5))
    }

    fn three_chunk_backend() -> ScriptedBackend {
        ScriptedBackend::new(vec![
            ExportStatus::new(ExportState::Queued),
            ExportStatus::new(ExportState::Queued),
            ExportStatus::finished(vec![1, 2, 3]),
        ])
        .with_chunk(1, br#"[{"chunk": 1, "n": 0}, {"chunk": 1, "n": 1}]"#)
        .with_chunk(2, br#"[{"chunk": 2, "n": 0}]"#)
        .with_chunk(3, br#"[{"chunk": 3, "n": 0}, {"chunk": 3, "n": 1}]"#)
    }

    #[tokio::test]
    async fn test_cursor_submits_once_and_walks_chunks() {
        let poller = ExportPoller::with_options(three_chunk_backend(), fast());
        let mut cursor = ExportCursor::new(poller.clone(), ());
        let cancel = CancellationToken::new();

        assert_eq!(cursor.phase(), JobPhase::NotSubmitted);

        for _ in 0..3 {
            let page = cursor.next_chunk(&cancel).await.unwrap();
            assert!(!page.data.is_empty());
            assert_eq!(cursor.phase(), JobPhase::Ready);
        }
        assert_eq!(cursor.chunks_remaining(), 0);

        let page = cursor.next_chunk(&cancel).await.unwrap();
        assert_eq!(page.data, b"[]".to_vec());

        let backend = poller.backend();
        assert_eq!(backend.submits.load(Ordering::SeqCst), 1);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
        assert_eq!(*backend.chunk_fetches.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sequence_yields_chunks_in_order() {
        let poller = ExportPoller::with_options(three_chunk_backend(), fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        let all = items.drain_all().await.unwrap();
        let order: Vec<(u64, u32)> = all.iter().map(|f| (f.chunk, f.n)).collect();
        assert_eq!(order, vec![(1, 0), (1, 1), (2, 0), (3, 0), (3, 1)]);
        assert!(items.error().is_none());
        assert_eq!(poller.backend().submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunk_order_follows_status_not_ids() {
        let backend = ScriptedBackend::new(vec![ExportStatus::finished(vec![9, 4])])
            .with_chunk(4, br#"[{"chunk": 4, "n": 0}]"#)
            .with_chunk(9, br#"[{"chunk": 9, "n": 0}]"#);
        let poller = ExportPoller::with_options(backend, fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        let chunks: Vec<u64> = items
            .drain_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.chunk)
            .collect();
        assert_eq!(chunks, vec![9, 4]);
    }

    #[tokio::test]
    async fn test_empty_chunks_do_not_end_sequence() {
        let backend = ScriptedBackend::new(vec![ExportStatus::finished(vec![1, 2, 3])])
            .with_chunk(1, br#"[{"chunk": 1, "n": 0}]"#)
            .with_chunk(2, b" [ ]\n")
            .with_chunk(3, br#"[{"chunk": 3, "n": 0}]"#);
        let poller = ExportPoller::with_options(backend, fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        let chunks: Vec<u64> = items
            .drain_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.chunk)
            .collect();
        assert_eq!(chunks, vec![1, 3]);
        assert_eq!(*poller.backend().chunk_fetches.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_null_chunk_does_not_end_sequence() {
        let backend = ScriptedBackend::new(vec![ExportStatus::finished(vec![1, 2, 3])])
            .with_chunk(1, br#"[{"chunk": 1, "n": 0}]"#)
            .with_chunk(2, b"null")
            .with_chunk(3, br#"[{"chunk": 3, "n": 0}]"#);
        let poller = ExportPoller::with_options(backend, fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        let chunks: Vec<u64> = items
            .drain_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.chunk)
            .collect();
        assert_eq!(chunks, vec![1, 3]);
        assert!(items.error().is_none());
    }

    #[test]
    fn test_is_empty_chunk() {
        assert!(is_empty_chunk(b"[]"));
        assert!(is_empty_chunk(b"  [\n]  "));
        assert!(is_empty_chunk(b""));
        assert!(is_empty_chunk(b"null"));
        assert!(is_empty_chunk(b" null\n"));
        assert!(!is_empty_chunk(br#"[{"n": 1}]"#));
        assert!(!is_empty_chunk(b"{not json"));
    }

    #[tokio::test]
    async fn test_job_error_yields_no_items() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Error)]);
        let poller = ExportPoller::with_options(backend, fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        assert!(!items.advance().await);
        assert!(matches!(items.error(), Some(TioError::JobFailed { .. })));
        assert!(!items.advance().await);
        assert!(poller.backend().chunk_fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cursor_does_not_repoll() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Cancelled)]);
        let poller = ExportPoller::with_options(backend, fast());
        let mut cursor = ExportCursor::new(poller.clone(), ());
        let cancel = CancellationToken::new();

        let first = cursor.next_chunk(&cancel).await.unwrap_err();
        assert!(matches!(first, TioError::JobCancelled { .. }));
        assert_eq!(cursor.phase(), JobPhase::Cancelled);

        let second = cursor.next_chunk(&cancel).await.unwrap_err();
        assert!(matches!(second, TioError::JobCancelled { .. }));
        assert_eq!(poller.backend().polls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.backend().submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caller_cancel_aborts_sequence() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Processing)]);
        let poller = ExportPoller::with_options(
            backend,
            PollerOptions::default().with_poll_interval(Duration::from_secs(3600)),
        );
        let cancel = CancellationToken::new();
        let mut items: Paginator<Finding> = poller.paginator((), cancel.clone()).unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let advanced = tokio::time::timeout(Duration::from_secs(5), items.advance())
            .await
            .expect("sequence ignored cancellation");
        assert!(!advanced);
        assert!(items.error().unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_chunk_error_terminates_sequence() {
        let backend = three_chunk_backend().failing_chunk(2);
        let poller = ExportPoller::with_options(backend, fast());
        let mut items: Paginator<Finding> =
            poller.paginator((), CancellationToken::new()).unwrap();

        let mut seen = Vec::new();
        while items.advance().await {
            seen.push(items.current().unwrap().chunk);
        }
        assert_eq!(seen, vec![1, 1]);
        assert!(matches!(items.error(), Some(TioError::Api { .. })));
        assert_eq!(*poller.backend().chunk_fetches.lock().unwrap(), vec![1, 2]);
    }
}
