//! Error types for Tenable API operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during Tenable API operations.
///
/// The type is `Clone` so that a [`Paginator`](crate::Paginator) can keep
/// reporting the same terminal error from its accessor and its bulk
/// consumers. Foreign error types are held behind an [`Arc`] for that reason.
#[derive(Debug, Clone, Error)]
pub enum TioError {
    /// Configuration is missing or incomplete.
    #[error("Tenable configuration required: {0}")]
    ConfigMissing(String),

    /// A caller-supplied argument was rejected before any request was made.
    #[error("validation error for {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The API answered with a non-success status code.
    #[error("Tenable API error (status {status_code}): {message}")]
    Api {
        status_code: u16,
        message: String,
        request_id: Option<String>,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    /// JSON parsing error.
    #[error("Failed to parse response: {0}")]
    Parse(#[source] Arc<serde_json::Error>),

    /// A page decoder rejected its input for a reason other than JSON syntax.
    #[error("Failed to decode page: {0}")]
    Decode(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend reported that an export job failed.
    #[error("{export_type} export {job_id} error: {message}")]
    JobFailed {
        export_type: &'static str,
        job_id: String,
        message: String,
    },

    /// The backend reported that an export job was cancelled.
    #[error("{export_type} export {job_id} error: export cancelled")]
    JobCancelled {
        export_type: &'static str,
        job_id: String,
    },

    /// The export did not finish within the configured deadline.
    #[error("{export_type} export {job_id} has timed out")]
    JobTimeout {
        export_type: &'static str,
        job_id: String,
    },

    /// The caller's cancellation token fired while waiting.
    #[error("operation cancelled by caller")]
    Cancelled,
}

impl TioError {
    /// Returns true if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the backend reported a terminal failure for a job.
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. } | Self::JobCancelled { .. })
    }

    /// The HTTP status code, if this error came from an API response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true for a 404 Not Found response.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Returns true for a 401 Unauthorized response.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    /// Returns true for a 403 Forbidden response.
    pub fn is_forbidden(&self) -> bool {
        self.status_code() == Some(403)
    }

    /// Returns true for a 429 Too Many Requests response.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }

    /// Returns true for any 5xx response.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), Some(500..=599))
    }
}

impl From<reqwest::Error> for TioError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for TioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(Arc::new(err))
    }
}

/// Result type alias for Tenable operations.
pub type Result<T> = core::result::Result<T, TioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_classification() {
        let err = TioError::Api {
            status_code: 404,
            message: "asset not found".to_string(),
            request_id: None,
        };
        assert!(err.is_not_found());
        assert!(!err.is_server_error());

        let err = TioError::Api {
            status_code: 503,
            message: "unavailable".to_string(),
            request_id: Some("abc".to_string()),
        };
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), Some(503));
    }

    #[test]
    fn test_job_errors_are_distinct_from_cancellation() {
        let failed = TioError::JobFailed {
            export_type: "vulns",
            job_id: "uuid-1".to_string(),
            message: "export failed".to_string(),
        };
        assert!(failed.is_job_failure());
        assert!(!failed.is_cancelled());
        assert_eq!(failed.to_string(), "vulns export uuid-1 error: export failed");

        assert!(TioError::Cancelled.is_cancelled());
        assert!(!TioError::Cancelled.is_job_failure());
    }

    #[test]
    fn test_parse_error_clones_share_source() {
        let err: TioError = serde_json::from_str::<Vec<u32>>("{").unwrap_err().into();
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(matches!(cloned, TioError::Parse(_)));
    }
}
