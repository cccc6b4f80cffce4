//! Tenable Vulnerability Management API client library.
//!
//! A Rust library for the Tenable VM REST API built around two pieces:
//!
//! - [`Paginator`], a lazy sequence over offset-paged listings with
//!   pluggable fetch ([`PageFetcher`]) and decode ([`PageDecoder`])
//!   strategies
//! - [`ExportPoller`], which drives bulk exports through
//!   submit → poll → chunk retrieval and can present the chunks as a
//!   [`Paginator`]
//!
//! # Quick Start
//!
//! ```no_run
//! use tioapi::{Asset, List, TioClient, VulnExportRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> tioapi::Result<()> {
//!     // Create client from environment variables
//!     let client = TioClient::from_env()?;
//!     let cancel = CancellationToken::new();
//!
//!     // Walk all assets, one page at a time
//!     let mut assets = Asset::list(&client, Default::default(), cancel.clone())?;
//!     while assets.advance().await {
//!         println!("{:?}", assets.current().map(|a| &a.id));
//!     }
//!
//!     // Export vulnerabilities and read the first thousand findings
//!     let mut vulns = client
//!         .exports::<VulnExportRequest>()
//!         .items(VulnExportRequest::default(), cancel)?;
//!     let first = vulns.drain_up_to(1000).await?;
//!     println!("Read {} findings", first.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! The client reads configuration from environment variables:
//!
//! - `TIO_ACCESS_KEY` (required) - API access key
//! - `TIO_SECRET_KEY` (required) - API secret key
//! - `TIO_URL` (optional) - Base URL (defaults to `https://cloud.tenable.com`)
//!
//! [`ClientConfig`] sets the same values, plus retry and user-agent
//! settings, programmatically.

pub mod cli;
mod client;
mod error;
pub mod jobs;
mod models;
pub mod output;
mod pagination;
mod paginator;
mod traits;

#[cfg(feature = "test-server")]
pub mod mock_server;

// Re-export core types
pub use client::{ClientConfig, TioClient, DEFAULT_API_URL};
pub use error::{Result, TioError};
pub use pagination::{
    fetcher_fn, FetchedPage, FnFetcher, JsonDecoder, PageDecoder, PageFetcher, PaginationInfo,
    PaginatorOptions, DEFAULT_PAGE_SIZE,
};
pub use paginator::Paginator;

// Re-export job types
pub use jobs::{
    ExportCursor, ExportKind, ExportPoller, ExportRequest, ExportState, ExportStatus, ExportsApi,
    JobBackend, JobPhase, PollerOptions,
};

// Re-export traits
pub use traits::{Get, List};

// Re-export models
pub use models::{
    // Asset types
    Asset,
    AssetListQuery,
    AssetSource,
    AssetTag,
    // Audit log types
    AuditActor,
    AuditEvent,
    AuditField,
    AuditLogQuery,
    AuditTarget,
    // Export types
    AssetExportRequest,
    ComplianceExportRequest,
    ExportedAsset,
    ExportedVuln,
    NetworkInterface,
    VulnAsset,
    VulnExportRequest,
    VulnPlugin,
    VulnPort,
    VulnScan,
    DEFAULT_ASSET_CHUNK_SIZE,
    DEFAULT_NUM_ASSETS,
};
