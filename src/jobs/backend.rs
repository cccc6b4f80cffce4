//! Remote operations behind an export job, and their HTTP implementation.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::TioClient;
use crate::error::Result;
use crate::jobs::status::ExportStatus;

/// The three remote operations of an export workflow, plus cancellation.
///
/// [`ExportsApi`] talks to the Tenable API; tests substitute scripted
/// backends.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Request body accepted by [`submit`](Self::submit).
    type Request: Send + Sync;

    /// Export type name used in logs and errors (e.g. `"vulns"`).
    fn export_type(&self) -> &'static str;

    /// Create a new job and return its identifier.
    async fn submit(&self, request: &Self::Request) -> Result<String>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<ExportStatus>;

    /// Download one chunk of a finished job.
    async fn fetch_chunk(&self, job_id: &str, chunk_id: u64) -> Result<Vec<u8>>;

    /// Ask the server to cancel a job.
    async fn cancel(&self, job_id: &str) -> Result<()>;
}

/// Kind of bulk export supported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Assets,
    Vulns,
    Compliance,
}

impl ExportKind {
    /// Path segment and display name of this export kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Vulns => "vulns",
            Self::Compliance => "compliance",
        }
    }
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body for one kind of export.
///
/// Ties the request to its endpoint family and to the item type found in
/// its chunks.
pub trait ExportRequest: Serialize + Clone + Send + Sync + 'static {
    /// Endpoint family this request is posted to.
    const KIND: ExportKind;

    /// Item type contained in each chunk.
    type Item: DeserializeOwned + Send + 'static;

    /// Fill unset fields with the API's documented defaults.
    fn apply_defaults(&mut self);

    /// Reject requests the API would refuse.
    ///
    /// # Errors
    ///
    /// Returns [`TioError::Validation`](crate::TioError::Validation) for
    /// out-of-range values.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export_uuid: String,
}

#[derive(Debug, Deserialize)]
struct ExportList {
    #[serde(default)]
    exports: Vec<ExportStatus>,
}

/// Export endpoints of the Tenable API for one kind of export.
///
/// ```text
/// POST {kind}/export
/// GET  {kind}/export/{uuid}/status
/// GET  {kind}/export/{uuid}/chunks/{chunk}
/// POST {kind}/export/{uuid}/cancel
/// GET  {kind}/export/status
/// ```
pub struct ExportsApi<R> {
    client: TioClient,
    _request: PhantomData<fn() -> R>,
}

impl<R> Clone for ExportsApi<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _request: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for ExportsApi<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportsApi")
            .field("client", &self.client)
            .finish()
    }
}

impl<R: ExportRequest> ExportsApi<R> {
    /// Create export endpoints for request type `R`.
    pub fn new(client: TioClient) -> Self {
        Self {
            client,
            _request: PhantomData,
        }
    }

    /// List recent exports of this kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Vec<ExportStatus>> {
        let path = format!("{}/export/status", R::KIND);
        let list: ExportList = self.client.get_with_query(&path, &[("size", 1000)]).await?;
        Ok(list.exports)
    }
}

#[async_trait]
impl<R: ExportRequest> JobBackend for ExportsApi<R> {
    type Request = R;

    fn export_type(&self) -> &'static str {
        R::KIND.as_str()
    }

    async fn submit(&self, request: &Self::Request) -> Result<String> {
        let mut request = request.clone();
        request.apply_defaults();
        request.validate()?;

        let path = format!("{}/export", R::KIND);
        let response: ExportResponse = self.client.post(&path, &request).await?;
        Ok(response.export_uuid)
    }

    async fn status(&self, job_id: &str) -> Result<ExportStatus> {
        let path = format!("{}/export/{}/status", R::KIND, urlencoding::encode(job_id));
        self.client.get(&path).await
    }

    async fn fetch_chunk(&self, job_id: &str, chunk_id: u64) -> Result<Vec<u8>> {
        let path = format!(
            "{}/export/{}/chunks/{chunk_id}",
            R::KIND,
            urlencoding::encode(job_id)
        );
        self.client.download(&path).await
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        let path = format!("{}/export/{}/cancel", R::KIND, urlencoding::encode(job_id));
        self.client.post_empty(&path).await
    }
}
