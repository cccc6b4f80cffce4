//! Mock Tenable API server.
//!
//! Provides an axum-based HTTP server that simulates the Tenable VM API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{DefaultScenario, Fixtures};
use super::handlers::{self, SharedState};
use super::state::MockState;
use crate::jobs::ExportKind;

/// How long [`MockServer::shutdown`] waits for open connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A mock Tenable API server for testing.
///
/// Runs on a background task bound to an ephemeral local port. Export jobs
/// progress from QUEUED to FINISHED as the client polls them, and the state
/// can be inspected or changed while a test runs.
pub struct MockServer {
    addr: SocketAddr,
    url: String,
    state: SharedState,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Start a server preloaded with [`Fixtures::default_scenario`].
    pub async fn start() -> Self {
        Self::with_state(Self::default_state()).await
    }

    /// Start a server with no data.
    pub async fn start_empty() -> Self {
        Self::with_state(MockState::new()).await
    }

    /// Start a server serving `state`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn with_state(state: MockState) -> Self {
        let state = state.shared();
        let app = Self::create_router(state.clone());

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("mock server could not bind a local port");
        let addr = listener
            .local_addr()
            .expect("mock server listener has no address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = served {
                tracing::error!(error = %err, "Mock server stopped");
            }
        });

        tracing::debug!(%addr, "Mock server listening");
        Self {
            addr,
            url: format!("http://{addr}"),
            state,
            shutdown_tx,
            task,
        }
    }

    /// Build the router without binding a socket.
    ///
    /// Handy for driving requests in-process with `tower::ServiceExt`.
    pub fn router(state: MockState) -> Router {
        Self::create_router(state.shared())
    }

    /// Base URL to hand to [`TioClient`](crate::TioClient).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Socket address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for inspecting or changing data mid-test.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Stop accepting connections and wait for the server task to end.
    ///
    /// Connections still open after a one second grace period are dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let mut task = self.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            task.abort();
            let _ = task.await;
        }
    }

    /// State holding the default scenario.
    pub fn default_state() -> MockState {
        let DefaultScenario {
            assets,
            audit_events,
            exported_assets,
            exported_vulns,
        } = Fixtures::default_scenario();

        MockState {
            assets,
            audit_events,
            exported_assets,
            exported_vulns,
            ..MockState::new()
        }
    }

    /// API routes behind the key check, plus an open health route.
    fn create_router(state: SharedState) -> Router {
        let mut api = Router::new()
            // Asset routes
            .route("/assets", get(handlers::list_assets))
            .route("/assets/:uuid", get(handlers::get_asset))
            // Audit log routes
            .route("/audit-log/v1/events", get(handlers::list_audit_events));

        // Export routes
        for kind in [ExportKind::Assets, ExportKind::Vulns, ExportKind::Compliance] {
            api = api.merge(Self::export_routes(kind));
        }

        api.layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_keys,
        ))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
    }

    /// Export routes for one kind.
    fn export_routes(kind: ExportKind) -> Router<SharedState> {
        let base = format!("/{}/export", kind);

        Router::new()
            .route(
                &base,
                post(
                    move |State(state): State<SharedState>, Json(body): Json<Value>| {
                        handlers::create_export(kind, state, body)
                    },
                ),
            )
            .route(
                &format!("{base}/status"),
                get(move |State(state): State<SharedState>| handlers::list_exports(kind, state)),
            )
            .route(
                &format!("{base}/:uuid/status"),
                get(
                    move |State(state): State<SharedState>, Path(uuid): Path<String>| {
                        handlers::export_status(kind, state, uuid)
                    },
                ),
            )
            .route(
                &format!("{base}/:uuid/chunks/:chunk_id"),
                get(
                    move |State(state): State<SharedState>,
                          Path((uuid, chunk_id)): Path<(String, u64)>| {
                        handlers::export_chunk(kind, state, uuid, chunk_id)
                    },
                ),
            )
            .route(
                &format!("{base}/:uuid/cancel"),
                post(
                    move |State(state): State<SharedState>, Path(uuid): Path<String>| {
                        handlers::cancel_export(kind, state, uuid)
                    },
                ),
            )
    }
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}
