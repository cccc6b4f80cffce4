//! Export job status as reported by the API, and the client-side state
//! machine driven by it.

use serde::{Deserialize, Serialize};

/// Status value reported by an export status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportState {
    /// Accepted but not started.
    #[default]
    #[serde(alias = "SUBMITTED")]
    Queued,
    /// Chunks are being produced.
    #[serde(alias = "RUNNING")]
    Processing,
    /// All chunks are available.
    #[serde(alias = "READY")]
    Finished,
    /// Cancelled on the server.
    Cancelled,
    /// Failed on the server.
    Error,
    /// A value this client does not recognise. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl ExportState {
    /// Returns true if the job will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Error)
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Status of an export job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportStatus {
    /// Export identifier. Present in listings, absent from single status calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Current state.
    pub status: ExportState,

    /// Chunk identifiers ready for download, in the order to consume them.
    #[serde(default)]
    pub chunks_available: Vec<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks_failed: Vec<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks_cancelled: Vec<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_chunks: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_assets_per_chunk: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_chunks_count: Option<u64>,

    /// Creation time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

impl ExportStatus {
    /// A status in the given state with no chunks.
    #[must_use]
    pub fn new(status: ExportState) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// A finished status with the given chunks.
    #[must_use]
    pub fn finished(chunks: impl Into<Vec<u64>>) -> Self {
        Self {
            status: ExportState::Finished,
            chunks_available: chunks.into(),
            ..Default::default()
        }
    }
}

/// Client-side phase of an export job.
///
/// ```text
/// NotSubmitted --submit--> Submitted
/// Submitted --QUEUED/PROCESSING/unknown--> Submitted
/// Submitted --FINISHED--> Ready
/// Submitted --CANCELLED--> Cancelled
/// Submitted --ERROR--> Failed
/// Submitted --caller cancelled--> Aborted
/// ```
///
/// Terminal phases absorb every further event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobPhase {
    #[default]
    NotSubmitted,
    Submitted,
    Ready,
    Cancelled,
    Failed,
    Aborted,
}

impl JobPhase {
    /// Returns true if no transition leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Cancelled | Self::Failed | Self::Aborted
        )
    }

    /// The phase after a successful submit.
    #[must_use]
    pub fn submitted(self) -> Self {
        match self {
            Self::NotSubmitted => Self::Submitted,
            other => other,
        }
    }

    /// The phase after observing a polled status.
    #[must_use]
    pub fn observe(self, state: ExportState) -> Self {
        if self != Self::Submitted {
            return self;
        }
        match state {
            ExportState::Finished => Self::Ready,
            ExportState::Cancelled => Self::Cancelled,
            ExportState::Error => Self::Failed,
            ExportState::Queued | ExportState::Processing | ExportState::Unknown => self,
        }
    }

    /// The phase after the caller gave up waiting.
    #[must_use]
    pub fn abort(self) -> Self {
        if self.is_terminal() {
            self
        } else {
            Self::Aborted
        }
    }
}
