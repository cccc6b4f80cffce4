//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the tioapi binary.

use clap::{Parser, Subcommand, ValueEnum};

use crate::jobs::ExportKind;

/// Tenable Vulnerability Management command-line interface.
#[derive(Parser, Debug)]
#[command(name = "tioapi", about = "Tenable VM API CLI", version)]
pub struct Cli {
    /// Output results as JSON instead of a table.
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Work with assets.
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },

    /// List audit log events.
    AuditLog {
        /// Only events by this actor id.
        #[arg(long)]
        actor: Option<String>,

        /// Only events with this action name.
        #[arg(long)]
        action: Option<String>,

        /// Maximum number of events to print.
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Run a bulk export and print its items.
    Export {
        /// The kind of export to run.
        kind: ExportArg,

        /// Seconds between status polls.
        #[arg(long, default_value = "5")]
        poll_interval: u64,

        /// Stop after this many items.
        #[arg(long)]
        take: Option<usize>,
    },

    /// Show recent exports of one kind.
    ExportStatus {
        /// The kind of export to list.
        kind: ExportArg,
    },
}

/// Asset subcommands.
#[derive(Subcommand, Debug)]
pub enum AssetsAction {
    /// List assets.
    List {
        /// Number of assets per page.
        #[arg(long)]
        limit: Option<u32>,

        /// Stop after this many pages (0 = no limit).
        #[arg(long, default_value = "0")]
        max_pages: u32,

        /// Filter expression passed to the assets endpoint.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Get a single asset by UUID.
    Get {
        /// The asset UUID.
        uuid: String,
    },
}

/// Export kinds selectable on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportArg {
    /// Asset inventory.
    #[value(alias = "asset")]
    Assets,
    /// Vulnerability findings.
    #[value(alias = "vuln", alias = "vulnerabilities")]
    Vulns,
    /// Compliance findings.
    Compliance,
}

impl From<ExportArg> for ExportKind {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::Assets => ExportKind::Assets,
            ExportArg::Vulns => ExportKind::Vulns,
            ExportArg::Compliance => ExportKind::Compliance,
        }
    }
}
