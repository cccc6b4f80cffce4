//! Output formatting for CLI display.
//!
//! Provides the [`PrettyPrint`] trait for human-readable output
//! as an alternative to JSON serialization.

use crate::{Asset, AuditEvent, ExportStatus};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Trait for human-readable key-value output.
///
/// Implemented by entity types to provide formatted output
/// suitable for terminal display when `--json` is not specified.
pub trait PrettyPrint {
    /// Returns a formatted string for terminal display.
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Asset {
    fn pretty_print(&self) -> String {
        let divider = "─".repeat(self.id.len().max(30));

        let mut lines = vec![format!("Asset: {}", self.id), divider];

        if let Some(name) = self.display_name() {
            lines.push(format!("Name:           {}", name));
        }

        if !self.ipv4.is_empty() {
            lines.push(format!("IPv4:           {}", self.ipv4.join(", ")));
        }

        if !self.operating_system.is_empty() {
            lines.push(format!("OS:             {}", self.operating_system.join(", ")));
        }

        lines.push(format!(
            "Agent:          {}",
            if self.has_agent { "yes" } else { "no" }
        ));

        if let Some(ref last_seen) = self.last_seen {
            lines.push(format!("Last Seen:      {}", last_seen.format(TIME_FORMAT)));
        }

        if let Some(score) = self.exposure_score {
            lines.push(format!("Exposure:       {}", score));
        }

        if !self.sources.is_empty() {
            let sources: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
            lines.push(format!("Sources:        {}", sources.join(", ")));
        }

        if self.is_retired() {
            lines.push("Status:         retired".to_string());
        }

        lines.join("\n")
    }
}

impl PrettyPrint for AuditEvent {
    fn pretty_print(&self) -> String {
        let header = format!("Event: {}", self.action);
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![header, divider, format!("ID:             {}", self.id)];

        if let Some(ref received) = self.received {
            lines.push(format!("Received:       {}", received.format(TIME_FORMAT)));
        }

        let actor = self.actor.name.as_deref().or(self.actor.id.as_deref());
        if let Some(actor) = actor {
            lines.push(format!("Actor:          {}", actor));
        }

        let target = self.target.name.as_deref().or(self.target.id.as_deref());
        if let Some(target) = target {
            lines.push(format!("Target:         {}", target));
        }

        if self.is_failure {
            lines.push("Outcome:        failure".to_string());
        }

        lines.join("\n")
    }
}

impl PrettyPrint for ExportStatus {
    fn pretty_print(&self) -> String {
        let header = format!("Export: {}", self.uuid.as_deref().unwrap_or("-"));
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![header, divider, format!("Status:         {}", self.status)];

        match (self.finished_chunks, self.total_chunks) {
            (Some(done), Some(total)) => {
                lines.push(format!("Chunks:         {}/{}", done, total));
            }
            _ => lines.push(format!("Chunks:         {}", self.chunks_available.len())),
        }

        if !self.chunks_failed.is_empty() {
            lines.push(format!("Failed Chunks:  {}", self.chunks_failed.len()));
        }

        if let Some(created) = self
            .created
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        {
            lines.push(format!("Created:        {}", created.format(TIME_FORMAT)));
        }

        lines.join("\n")
    }
}
