//! Tenable VM API CLI binary.
//!
//! A command-line interface for listing assets and audit events and for
//! running bulk exports.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tabled::{Table, Tabled};
use tioapi::cli::{AssetsAction, Cli, Command, ExportArg};
use tioapi::output::PrettyPrint;
use tioapi::{
    Asset, AssetExportRequest, AssetListQuery, AuditEvent, AuditLogQuery,
    ComplianceExportRequest, ExportRequest, ExportedAsset, ExportedVuln, Get, List,
    Paginator, PaginatorOptions, PollerOptions, TioClient, VulnExportRequest, DEFAULT_PAGE_SIZE,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = match TioClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Hint: Set TIO_ACCESS_KEY and TIO_SECRET_KEY environment variables");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(&client, cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &TioClient, cli: Cli, cancel: CancellationToken) -> tioapi::Result<()> {
    match cli.command {
        Command::Assets { action } => handle_assets(client, action, cancel, cli.json).await,
        Command::AuditLog {
            actor,
            action,
            limit,
        } => handle_audit_log(client, actor, action, limit, cancel, cli.json).await,
        Command::Export {
            kind,
            poll_interval,
            take,
        } => {
            let options =
                PollerOptions::default().with_poll_interval(Duration::from_secs(poll_interval));
            handle_export(client, kind, options, take, cancel, cli.json).await
        }
        Command::ExportStatus { kind } => handle_export_status(client, kind, &cancel, cli.json).await,
    }
}

async fn handle_assets(
    client: &TioClient,
    action: AssetsAction,
    cancel: CancellationToken,
    json: bool,
) -> tioapi::Result<()> {
    match action {
        AssetsAction::Get { uuid } => {
            let asset = Asset::get(client, uuid).await?;
            output_single(&asset, json)?;
        }
        AssetsAction::List {
            limit,
            max_pages,
            filter,
        } => {
            let query = AssetListQuery {
                filter,
                ..Default::default()
            };
            let options = PaginatorOptions::default()
                .with_limit(limit.unwrap_or(DEFAULT_PAGE_SIZE))
                .with_max_pages(max_pages);
            let mut assets = Asset::list_with_options(client, query, cancel, options)?;
            let items = assets.drain_all().await?;
            output_items(&items, &assets, json, |x| AssetRow::from(x))?;
        }
    }
    Ok(())
}

async fn handle_audit_log(
    client: &TioClient,
    actor: Option<String>,
    action: Option<String>,
    limit: usize,
    cancel: CancellationToken,
    json: bool,
) -> tioapi::Result<()> {
    let query = AuditLogQuery {
        actor,
        action,
        ..Default::default()
    };
    let page_size = u32::try_from(limit)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, DEFAULT_PAGE_SIZE);
    let options = PaginatorOptions::default().with_limit(page_size);

    let mut events = AuditEvent::list_with_options(client, query, cancel, options)?;
    let items = events.drain_up_to(limit).await?;
    output_items(&items, &events, json, |x| AuditRow::from(x))
}

async fn handle_export(
    client: &TioClient,
    kind: ExportArg,
    options: PollerOptions,
    take: Option<usize>,
    cancel: CancellationToken,
    json: bool,
) -> tioapi::Result<()> {
    match kind {
        ExportArg::Assets => {
            let items =
                run_export(client, AssetExportRequest::default(), options, take, cancel).await?;
            output_rows(&items, json, |x| ExportedAssetRow::from(x))
        }
        ExportArg::Vulns => {
            let items =
                run_export(client, VulnExportRequest::default(), options, take, cancel).await?;
            output_rows(&items, json, |x| VulnRow::from(x))
        }
        ExportArg::Compliance => {
            // Compliance findings have no fixed shape, so always print JSON
            let items =
                run_export(client, ComplianceExportRequest::default(), options, take, cancel)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
    }
}

async fn run_export<R: ExportRequest>(
    client: &TioClient,
    request: R,
    options: PollerOptions,
    take: Option<usize>,
    cancel: CancellationToken,
) -> tioapi::Result<Vec<R::Item>> {
    let mut items = client.exports_with_options::<R>(options).items(request, cancel)?;
    match take {
        Some(n) => items.drain_up_to(n).await,
        None => items.drain_all().await,
    }
}

async fn handle_export_status(
    client: &TioClient,
    kind: ExportArg,
    cancel: &CancellationToken,
    json: bool,
) -> tioapi::Result<()> {
    let exports = match kind {
        ExportArg::Assets => client.exports::<AssetExportRequest>().list_jobs(cancel).await?,
        ExportArg::Vulns => client.exports::<VulnExportRequest>().list_jobs(cancel).await?,
        ExportArg::Compliance => {
            client
                .exports::<ComplianceExportRequest>()
                .list_jobs(cancel)
                .await?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&exports)?);
    } else if exports.is_empty() {
        println!("No {} exports", tioapi::ExportKind::from(kind));
    } else {
        let blocks: Vec<String> = exports.iter().map(PrettyPrint::pretty_print).collect();
        println!("{}", blocks.join("\n\n"));
    }
    Ok(())
}

fn output_single<T: Serialize + PrettyPrint>(item: &T, json: bool) -> tioapi::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(item)?);
    } else {
        println!("{}", item.pretty_print());
    }
    Ok(())
}

fn output_rows<T, R, F>(items: &[T], json: bool, to_row: F) -> tioapi::Result<()>
where
    T: Serialize,
    R: Tabled,
    F: Fn(&T) -> R,
{
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        let rows: Vec<R> = items.iter().map(to_row).collect();
        println!("{}", Table::new(rows));
    }
    Ok(())
}

fn output_items<T, R, F>(
    items: &[T],
    paginator: &Paginator<T>,
    json: bool,
    to_row: F,
) -> tioapi::Result<()>
where
    T: Serialize,
    R: Tabled,
    F: Fn(&T) -> R,
{
    output_rows(items, json, to_row)?;
    if !json {
        match paginator.total() {
            Some(total) => println!(
                "\n{} of {} items ({} pages)",
                items.len(),
                total,
                paginator.pages_fetched()
            ),
            None => println!(
                "\n{} items ({} pages)",
                items.len(),
                paginator.pages_fetched()
            ),
        }
    }
    Ok(())
}

// Table row types for non-JSON output

#[derive(Tabled)]
struct AssetRow {
    id: String,
    name: String,
    ipv4: String,
    last_seen: String,
}

impl From<&Asset> for AssetRow {
    fn from(a: &Asset) -> Self {
        Self {
            id: a.id.clone(),
            name: a.display_name().unwrap_or_default().to_string(),
            ipv4: a.ipv4.join(", "),
            last_seen: a
                .last_seen
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct AuditRow {
    received: String,
    action: String,
    actor: String,
    #[tabled(rename = "failed")]
    is_failure: bool,
}

impl From<&AuditEvent> for AuditRow {
    fn from(e: &AuditEvent) -> Self {
        Self {
            received: e
                .received
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            action: e.action.clone(),
            actor: e
                .actor
                .name
                .clone()
                .or_else(|| e.actor.id.clone())
                .unwrap_or_default(),
            is_failure: e.is_failure,
        }
    }
}

#[derive(Tabled)]
struct ExportedAssetRow {
    id: String,
    hostname: String,
    ipv4: String,
}

impl From<&ExportedAsset> for ExportedAssetRow {
    fn from(a: &ExportedAsset) -> Self {
        Self {
            id: a.id.clone(),
            hostname: a
                .fqdn
                .first()
                .or_else(|| a.hostname.first())
                .cloned()
                .unwrap_or_default(),
            ipv4: a.ipv4.join(", "),
        }
    }
}

#[derive(Tabled)]
struct VulnRow {
    asset: String,
    plugin: u64,
    name: String,
    severity: String,
    state: String,
}

impl From<&ExportedVuln> for VulnRow {
    fn from(v: &ExportedVuln) -> Self {
        Self {
            asset: v
                .asset
                .hostname
                .clone()
                .or_else(|| v.asset.ipv4.clone())
                .unwrap_or_else(|| v.asset.uuid.clone()),
            plugin: v.plugin.id,
            name: v.plugin.name.clone(),
            severity: v.severity.clone(),
            state: v.state.clone(),
        }
    }
}
