//! Mock Tenable API server for E2E testing.
//!
//! This module provides an in-memory mock server that simulates the Tenable
//! VM API for integration and end-to-end testing. Unlike wiremock which mocks
//! at the HTTP level per-test, this server maintains state across requests,
//! so an export job moves through its lifecycle as the client polls it.
//!
//! # Example
//!
//! ```ignore
//! use tioapi::mock_server::MockServer;
//! use tioapi::{TioClient, VulnExportRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::test]
//! async fn test_workflow() {
//!     let server = MockServer::start().await;
//!     let client = TioClient::new("ak", "sk", server.url()).unwrap();
//!
//!     let mut vulns = client
//!         .exports::<VulnExportRequest>()
//!         .items(VulnExportRequest::default(), CancellationToken::new())
//!         .unwrap();
//!     assert_eq!(vulns.drain_all().await.unwrap().len(), 5);
//!
//!     server.shutdown().await;
//! }
//! ```

mod fixtures;
mod handlers;
mod server;
mod state;

pub use fixtures::{DefaultScenario, Fixtures};
pub use server::MockServer;
pub use state::{MockExport, MockState};
