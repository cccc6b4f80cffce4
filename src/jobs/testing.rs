//! Scripted in-memory job backend for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, TioError};
use crate::jobs::backend::JobBackend;
use crate::jobs::status::ExportStatus;

/// Replays a fixed list of statuses and serves canned chunks.
///
/// Statuses are handed out front to back; the last one repeats forever.
pub(crate) struct ScriptedBackend {
    statuses: Mutex<VecDeque<ExportStatus>>,
    chunks: HashMap<u64, Vec<u8>>,
    failing_poll: Option<usize>,
    failing_chunk: Option<u64>,
    pub polls: AtomicUsize,
    pub submits: AtomicUsize,
    pub cancelled: Mutex<Vec<String>>,
    pub chunk_fetches: Mutex<Vec<u64>>,
}

impl ScriptedBackend {
    pub fn new(statuses: Vec<ExportStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            chunks: HashMap::new(),
            failing_poll: None,
            failing_chunk: None,
            polls: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            cancelled: Mutex::new(Vec::new()),
            chunk_fetches: Mutex::new(Vec::new()),
        }
    }

    /// Make the `n`th status call (1-based) fail with a 502.
    pub fn failing_status_on(mut self, n: usize) -> Self {
        self.failing_poll = Some(n);
        self
    }

    /// Make fetching `chunk_id` fail with a 502.
    pub fn failing_chunk(mut self, chunk_id: u64) -> Self {
        self.failing_chunk = Some(chunk_id);
        self
    }

    pub fn with_chunk(mut self, chunk_id: u64, data: &[u8]) -> Self {
        self.chunks.insert(chunk_id, data.to_vec());
        self
    }

    fn bad_gateway() -> TioError {
        TioError::Api {
            status_code: 502,
            message: "bad gateway".to_string(),
            request_id: None,
        }
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    type Request = ();

    fn export_type(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, _request: &()) -> Result<String> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn status(&self, _job_id: &str) -> Result<ExportStatus> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_poll == Some(n) {
            return Err(Self::bad_gateway());
        }
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.pop_front().unwrap())
        } else {
            Ok(statuses.front().cloned().unwrap_or_default())
        }
    }

    async fn fetch_chunk(&self, _job_id: &str, chunk_id: u64) -> Result<Vec<u8>> {
        self.chunk_fetches.lock().unwrap().push(chunk_id);
        if self.failing_chunk == Some(chunk_id) {
            return Err(Self::bad_gateway());
        }
        self.chunks.get(&chunk_id).cloned().ok_or(TioError::Api {
            status_code: 404,
            message: format!("chunk {chunk_id} not found"),
            request_id: None,
        })
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        self.cancelled.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}
