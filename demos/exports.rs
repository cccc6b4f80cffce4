//! Example walking assets and a vulnerability export with the Tenable client.
//!
//! Run with:
//! ```
//! TIO_ACCESS_KEY=... TIO_SECRET_KEY=... cargo run --example exports
//! ```

use std::time::Duration;

use futures::StreamExt;
use tioapi::{
    Asset, AssetListQuery, ExportState, List, PaginatorOptions, PollerOptions, TioClient,
    VulnExportRequest,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> tioapi::Result<()> {
    // Initialize tracing for debugging (optional)
    tracing_subscriber::fmt::init();

    println!("Creating Tenable client...");
    let client = TioClient::from_env()?;
    println!("Connected to: {}", client.base_url());

    // Stop everything on Ctrl+C
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // First few assets, one lazy page at a time
    println!("\n--- Assets (first 10) ---");
    let mut assets = Asset::list_with_options(
        &client,
        AssetListQuery::default(),
        cancel.clone(),
        PaginatorOptions::default().with_limit(5),
    )?;
    for asset in assets.drain_up_to(10).await? {
        println!(
            "  - {} ({})",
            asset.display_name().unwrap_or("unnamed"),
            asset.id
        );
    }
    println!(
        "Seen {} of {:?} assets in {} pages",
        assets.consumed(),
        assets.total(),
        assets.pages_fetched()
    );

    // Vulnerability export streamed chunk by chunk
    println!("\n--- Vulnerability export ---");
    let poller = client.exports_with_options::<VulnExportRequest>(
        PollerOptions::default()
            .with_poll_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(30 * 60)),
    );
    let request = VulnExportRequest {
        num_assets: Some(1000),
        ..Default::default()
    };

    let mut vulns = Box::pin(poller.items(request, cancel.clone())?.into_stream());
    let mut open = 0usize;
    let mut critical = 0usize;
    while let Some(vuln) = vulns.next().await {
        let vuln = vuln?;
        if vuln.is_open() {
            open += 1;
        }
        if vuln.severity == "critical" {
            critical += 1;
        }
    }
    println!("Open findings: {open} ({critical} critical)");

    // Recent jobs of this kind
    println!("\n--- Recent vulnerability exports ---");
    let recent = tioapi::ExportsApi::<VulnExportRequest>::new(client.clone())
        .list()
        .await?;
    for status in recent.iter().take(5) {
        let marker = if status.status == ExportState::Finished {
            "done"
        } else {
            "pending"
        };
        println!(
            "  - {} {} ({} chunks)",
            status.uuid.as_deref().unwrap_or("?"),
            marker,
            status.chunks_available.len()
        );
    }

    Ok(())
}
