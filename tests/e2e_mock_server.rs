//! End-to-end tests against the stateful mock server.
//!
//! Run with: cargo test --features test-server

#![cfg(feature = "test-server")]

use std::time::Duration;

use tioapi::mock_server::{Fixtures, MockServer, MockState};
use tioapi::{
    Asset, AssetExportRequest, AssetListQuery, AuditEvent, AuditLogQuery, ExportState, Get, List,
    PaginatorOptions, PollerOptions, TioClient, TioError, VulnExportRequest,
};
use tokio_util::sync::CancellationToken;

fn fast() -> PollerOptions {
    PollerOptions::default().with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_server_lifecycle() {
    let server = MockServer::start().await;
    assert!(server.url().starts_with("http://127.0.0.1:"));

    let client = TioClient::new("ak", "sk", server.url()).unwrap();
    let asset = Asset::get(&client, "00000000-0000-4000-a000-000000000001".to_string())
        .await
        .unwrap();
    assert_eq!(asset.display_name(), Some("host001"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_list_all_assets() {
    let server = MockServer::start().await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let assets = Asset::list_all(&client, &AssetListQuery::default())
        .await
        .unwrap();

    assert_eq!(assets.len(), 5);

    server.shutdown().await;
}

#[tokio::test]
async fn test_paged_assets_with_hidden_totals() {
    let state = MockServer::default_state().with_hidden_totals();
    let server = MockServer::with_state(state).await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let mut assets = Asset::list_with_options(
        &client,
        AssetListQuery::default(),
        CancellationToken::new(),
        PaginatorOptions::default().with_limit(2),
    )
    .unwrap();

    let items = assets.drain_all().await.unwrap();

    assert_eq!(items.len(), 5);
    assert_eq!(assets.total(), None);
    assert_eq!(assets.pages_fetched(), 3);

    server.shutdown().await;
}

#[tokio::test]
async fn test_page_cap_stops_early() {
    let state = MockState::new();
    let state = Fixtures::numbered_assets(10)
        .into_iter()
        .fold(state, MockState::with_asset);
    let server = MockServer::with_state(state).await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let mut assets = Asset::list_with_options(
        &client,
        AssetListQuery::default(),
        CancellationToken::new(),
        PaginatorOptions::default().with_limit(3).with_max_pages(2),
    )
    .unwrap();

    let items = assets.drain_all().await.unwrap();

    assert_eq!(items.len(), 6);
    assert_eq!(assets.total(), Some(10));

    server.shutdown().await;
}

#[tokio::test]
async fn test_audit_log_filtered_by_actor() {
    let server = MockServer::start().await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let query = AuditLogQuery {
        actor: Some("u-1".to_string()),
        ..Default::default()
    };
    let events = AuditEvent::list_all(&client, &query).await.unwrap();

    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_vuln_export_end_to_end() {
    let server = MockServer::start().await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let mut vulns = client
        .exports_with_options::<VulnExportRequest>(fast())
        .items(VulnExportRequest::default(), CancellationToken::new())
        .unwrap();

    let items = vulns.drain_all().await.unwrap();

    assert_eq!(items.len(), 5);
    assert_eq!(items[0].plugin.id, 19506);

    // One job was created and it reached FINISHED.
    let exports = client
        .exports::<VulnExportRequest>()
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].status, ExportState::Finished);

    server.shutdown().await;
}

#[tokio::test]
async fn test_asset_export_through_channel() {
    let server = MockServer::start().await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let assets = client
        .exports_with_options::<AssetExportRequest>(fast())
        .items(AssetExportRequest::default(), CancellationToken::new())
        .unwrap();

    let mut rx = assets.into_channel(2);
    let mut ids = Vec::new();
    while let Some(item) = rx.recv().await {
        ids.push(item.unwrap().id);
    }

    assert_eq!(ids.len(), 5);
    assert_eq!(ids[0], "export-asset-1");

    server.shutdown().await;
}

#[tokio::test]
async fn test_failing_export_reports_job_failed() {
    let state = MockServer::default_state().with_failing_exports();
    let server = MockServer::with_state(state).await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let mut vulns = client
        .exports_with_options::<VulnExportRequest>(fast())
        .items(VulnExportRequest::default(), CancellationToken::new())
        .unwrap();

    let err = vulns.drain_all().await.unwrap_err();
    assert!(matches!(err, TioError::JobFailed { .. }));

    // The failure is sticky.
    assert!(!vulns.advance().await);
    assert!(matches!(vulns.error(), Some(TioError::JobFailed { .. })));

    server.shutdown().await;
}

#[tokio::test]
async fn test_server_cancel_reports_job_cancelled() {
    let state = MockServer::default_state().with_polls_until_ready(1000);
    let server = MockServer::with_state(state).await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let poller = client.exports_with_options::<VulnExportRequest>(fast());
    let cancel = CancellationToken::new();

    let job_id = poller
        .submit(&cancel, &VulnExportRequest::default())
        .await
        .unwrap();
    poller.cancel_job(&cancel, &job_id).await.unwrap();

    let err = poller.wait_until_ready(&cancel, &job_id).await.unwrap_err();
    assert!(matches!(err, TioError::JobCancelled { .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn test_caller_cancel_stops_waiting() {
    let state = MockServer::default_state().with_polls_until_ready(1000);
    let server = MockServer::with_state(state).await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    let cancel = CancellationToken::new();
    let mut vulns = client
        .exports_with_options::<VulnExportRequest>(fast())
        .items(VulnExportRequest::default(), cancel.clone())
        .unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), vulns.drain_all())
        .await
        .expect("export ignored cancellation")
        .unwrap_err();

    assert!(err.is_cancelled());

    server.shutdown().await;
}

#[tokio::test]
async fn test_required_keys_reject_wrong_client() {
    let state = MockServer::default_state().with_required_keys("ak", "sk");
    let server = MockServer::with_state(state).await;

    let good = TioClient::new("ak", "sk", server.url()).unwrap();
    let bad = TioClient::new("ak", "wrong", server.url()).unwrap();

    let assets = Asset::list_all(&good, &AssetListQuery::default())
        .await
        .unwrap();
    assert_eq!(assets.len(), 5);

    let err = Asset::list_all(&bad, &AssetListQuery::default())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    server.shutdown().await;
}

#[tokio::test]
async fn test_state_is_mutable_during_test() {
    let server = MockServer::start_empty().await;
    let client = TioClient::new("ak", "sk", server.url()).unwrap();

    server
        .state()
        .write()
        .await
        .assets
        .push(Fixtures::asset("late", "late-host", "10.9.9.9"));

    let asset = Asset::get(&client, "late".to_string()).await.unwrap();
    assert_eq!(asset.ipv4, vec!["10.9.9.9".to_string()]);

    server.shutdown().await;
}
