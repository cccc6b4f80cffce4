//! Submit, poll and retrieve for long-running export jobs.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::TioClient;
use crate::error::{Result, TioError};
use crate::jobs::backend::{ExportRequest, ExportsApi, JobBackend};
use crate::jobs::cursor::ExportCursor;
use crate::jobs::status::{ExportStatus, JobPhase};
use crate::pagination::{cancellable, JsonDecoder, PaginatorOptions};
use crate::paginator::Paginator;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polling behaviour of an [`ExportPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    /// Wait between status polls.
    pub poll_interval: Duration,
    /// Give up with [`TioError::JobTimeout`] once waiting exceeds this.
    pub timeout: Option<Duration>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl PollerOptions {
    /// Set the interval between status polls.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set an overall deadline for waiting on a job.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Drives export jobs through submit → poll → chunk retrieval.
///
/// Every operation takes the caller's [`CancellationToken`]. Waiting checks
/// the token on every tick, so cancellation takes effect within one poll
/// interval and surfaces as [`TioError::Cancelled`], distinct from
/// [`TioError::JobCancelled`] and [`TioError::JobFailed`] which report the
/// server's verdict.
///
/// Nothing here retries: transport failures propagate as soon as they occur.
///
/// # Example
///
/// ```no_run
/// use tioapi::{TioClient, VulnExportRequest};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> tioapi::Result<()> {
/// let client = TioClient::from_env()?;
/// let poller = client.exports::<VulnExportRequest>();
/// let cancel = CancellationToken::new();
///
/// let job_id = poller.submit(&cancel, &VulnExportRequest::default()).await?;
/// let status = poller.wait_until_ready(&cancel, &job_id).await?;
/// for chunk_id in &status.chunks_available {
///     let bytes = poller.fetch_chunk(&cancel, &job_id, *chunk_id).await?;
///     println!("chunk {chunk_id}: {} bytes", bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ExportPoller<B> {
    backend: Arc<B>,
    options: PollerOptions,
}

impl<B> Clone for ExportPoller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            options: self.options,
        }
    }
}

impl<B> std::fmt::Debug for ExportPoller<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPoller")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<B: JobBackend> ExportPoller<B> {
    /// Create a poller with default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, PollerOptions::default())
    }

    /// Create a poller with explicit options.
    pub fn with_options(backend: B, options: PollerOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
        }
    }

    /// The backend this poller drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The polling options in effect.
    pub fn options(&self) -> PollerOptions {
        self.options
    }

    /// Submit a new job and return its identifier.
    ///
    /// Each call creates a new job on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, the request fails, or
    /// the token is cancelled.
    pub async fn submit(&self, cancel: &CancellationToken, request: &B::Request) -> Result<String> {
        let job_id = cancellable(cancel, self.backend.submit(request)).await?;
        tracing::info!(
            export_type = self.backend.export_type(),
            job_id = %job_id,
            "Export submitted"
        );
        Ok(job_id)
    }

    /// Poll a job until it finishes, returning its final status.
    ///
    /// # Errors
    ///
    /// - [`TioError::Cancelled`] if the token fires
    /// - [`TioError::JobCancelled`] if the server cancelled the job
    /// - [`TioError::JobFailed`] if the server reports an error
    /// - [`TioError::JobTimeout`] if the configured timeout elapses
    /// - any transport error from a status call
    pub async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
        job_id: &str,
    ) -> Result<ExportStatus> {
        let export_type = self.backend.export_type();
        let started = Instant::now();
        let mut phase = JobPhase::Submitted;
        let mut polls: u32 = 0;

        loop {
            let status = match cancellable(cancel, self.backend.status(job_id)).await {
                Ok(status) => status,
                Err(err) => {
                    if err.is_cancelled() {
                        phase = phase.abort();
                        tracing::debug!(export_type, job_id, ?phase, "Export wait aborted");
                    }
                    return Err(err);
                }
            };
            polls += 1;
            phase = phase.observe(status.status);

            match phase {
                JobPhase::Ready => {
                    tracing::info!(
                        export_type,
                        job_id,
                        polls,
                        chunks = status.chunks_available.len(),
                        "Export ready"
                    );
                    return Ok(status);
                }
                JobPhase::Cancelled => {
                    return Err(TioError::JobCancelled {
                        export_type,
                        job_id: job_id.to_string(),
                    });
                }
                JobPhase::Failed => {
                    return Err(TioError::JobFailed {
                        export_type,
                        job_id: job_id.to_string(),
                        message: "export failed".to_string(),
                    });
                }
                _ => {}
            }

            if let Some(timeout) = self.options.timeout {
                if started.elapsed() >= timeout {
                    return Err(TioError::JobTimeout {
                        export_type,
                        job_id: job_id.to_string(),
                    });
                }
            }

            tracing::debug!(
                export_type,
                job_id,
                status = %status.status,
                polls,
                "Export not ready, waiting"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    phase = phase.abort();
                    tracing::debug!(export_type, job_id, ?phase, "Export wait aborted");
                    return Err(TioError::Cancelled);
                }
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    /// Download one chunk of a finished job.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token is cancelled.
    pub async fn fetch_chunk(
        &self,
        cancel: &CancellationToken,
        job_id: &str,
        chunk_id: u64,
    ) -> Result<Vec<u8>> {
        tracing::debug!(
            export_type = self.backend.export_type(),
            job_id,
            chunk_id,
            "Fetching export chunk"
        );
        cancellable(cancel, self.backend.fetch_chunk(job_id, chunk_id)).await
    }

    /// Ask the server to cancel a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token is cancelled.
    pub async fn cancel_job(&self, cancel: &CancellationToken, job_id: &str) -> Result<()> {
        cancellable(cancel, self.backend.cancel(job_id)).await?;
        tracing::info!(
            export_type = self.backend.export_type(),
            job_id,
            "Export cancellation requested"
        );
        Ok(())
    }

    /// Stream a job's chunks as one sequence of decoded items.
    ///
    /// Nothing is sent until the first advance, which submits the job and
    /// waits for it; every later page is one chunk, in the order the
    /// finished status lists them. The job is submitted exactly once.
    ///
    /// # Errors
    ///
    /// Construction itself does not fail with default options; the `Result`
    /// mirrors [`Paginator::new`].
    pub fn paginator<T>(&self, request: B::Request, cancel: CancellationToken) -> Result<Paginator<T>>
    where
        B: 'static,
        B::Request: 'static,
        T: DeserializeOwned + 'static,
    {
        Paginator::new(
            ExportCursor::new(self.clone(), request),
            JsonDecoder::<T>::new(),
            cancel,
            PaginatorOptions::default(),
        )
    }
}

impl<R: ExportRequest> ExportPoller<ExportsApi<R>> {
    /// Stream the typed items of an export.
    ///
    /// # Errors
    ///
    /// See [`paginator`](Self::paginator).
    pub fn items(&self, request: R, cancel: CancellationToken) -> Result<Paginator<R::Item>> {
        self.paginator(request, cancel)
    }

    /// List recent jobs of this export kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token is cancelled.
    pub async fn list_jobs(&self, cancel: &CancellationToken) -> Result<Vec<ExportStatus>> {
        cancellable(cancel, self.backend.list()).await
    }
}

impl TioClient {
    /// Export endpoints for request type `R`, with default polling options.
    pub fn exports<R: ExportRequest>(&self) -> ExportPoller<ExportsApi<R>> {
        ExportPoller::new(ExportsApi::new(self.clone()))
    }

    /// Export endpoints for request type `R`, with explicit polling options.
    pub fn exports_with_options<R: ExportRequest>(
        &self,
        options: PollerOptions,
    ) -> ExportPoller<ExportsApi<R>> {
        ExportPoller::with_options(ExportsApi::new(self.clone()), options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::jobs::status::ExportState;
    use crate::jobs::testing::ScriptedBackend;

    fn fast() -> PollerOptions {
        PollerOptions::default().with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_wait_returns_after_second_running_poll() {
        let backend = ScriptedBackend::new(vec![
            ExportStatus::new(ExportState::Queued),
            ExportStatus::new(ExportState::Processing),
            ExportStatus::finished(vec![1, 2, 3]),
        ]);
        let poller = ExportPoller::with_options(backend, fast());
        let cancel = CancellationToken::new();

        let status = poller.wait_until_ready(&cancel, "job-1").await.unwrap();
        assert_eq!(status.chunks_available, vec![1, 2, 3]);
        assert_eq!(poller.backend().polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_remote_error_is_job_failed() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Error)]);
        let poller = ExportPoller::with_options(backend, fast());

        let err = poller
            .wait_until_ready(&CancellationToken::new(), "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TioError::JobFailed { .. }));
        assert_eq!(poller.backend().polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_cancel_is_job_cancelled() {
        let backend = ScriptedBackend::new(vec![
            ExportStatus::new(ExportState::Processing),
            ExportStatus::new(ExportState::Cancelled),
        ]);
        let poller = ExportPoller::with_options(backend, fast());

        let err = poller
            .wait_until_ready(&CancellationToken::new(), "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TioError::JobCancelled { .. }));
        assert!(!err.is_cancelled());
    }

    #[tokio::test]
    async fn test_caller_cancel_interrupts_long_poll_interval() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Processing)]);
        let poller = ExportPoller::with_options(
            backend,
            PollerOptions::default().with_poll_interval(Duration::from_secs(3600)),
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            poller.wait_until_ready(&cancel, "job-1"),
        )
        .await
        .expect("wait ignored cancellation")
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(poller.backend().polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Processing)]);
        let poller = ExportPoller::with_options(
            backend,
            fast().with_timeout(Duration::from_millis(30)),
        );

        let err = poller
            .wait_until_ready(&CancellationToken::new(), "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TioError::JobTimeout { .. }));
    }

    #[tokio::test]
    async fn test_status_transport_error_propagates_without_retry() {
        let backend = ScriptedBackend::new(vec![ExportStatus::new(ExportState::Processing)])
            .failing_status_on(2);
        let poller = ExportPoller::with_options(backend, fast());

        let err = poller
            .wait_until_ready(&CancellationToken::new(), "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TioError::Api { status_code: 502, .. }));
        assert_eq!(poller.backend().polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_is_not_idempotent() {
        let poller = ExportPoller::with_options(ScriptedBackend::new(vec![]), fast());
        let cancel = CancellationToken::new();

        let first = poller.submit(&cancel, &()).await.unwrap();
        let second = poller.submit(&cancel, &()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(poller.backend().submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_chunk_returns_raw_bytes() {
        let backend = ScriptedBackend::new(vec![ExportStatus::finished(vec![7])])
            .with_chunk(7, br#"[{"id": 7}]"#);
        let poller = ExportPoller::with_options(backend, fast());

        let bytes = poller
            .fetch_chunk(&CancellationToken::new(), "job-1", 7)
            .await
            .unwrap();
        assert_eq!(bytes, br#"[{"id": 7}]"#.to_vec());
    }

    #[tokio::test]
    async fn test_cancel_job_reaches_backend() {
        let poller = ExportPoller::with_options(ScriptedBackend::new(vec![]), fast());
        poller
            .cancel_job(&CancellationToken::new(), "job-9")
            .await
            .unwrap();
        assert_eq!(
            *poller.backend().cancelled.lock().unwrap(),
            vec!["job-9".to_string()]
        );
    }
}
