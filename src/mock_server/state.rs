//! Mock server state management.
//!
//! Provides the in-memory data store for the mock Tenable API server,
//! including export jobs that advance as they are polled.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::jobs::{ExportKind, ExportState, ExportStatus};
use crate::{Asset, AuditEvent, ExportedAsset, ExportedVuln};

/// An export job held by the mock server.
#[derive(Debug, Clone)]
pub struct MockExport {
    pub uuid: String,
    pub kind: ExportKind,
    pub state: ExportState,
    /// Status calls answered so far.
    pub polls: u32,
    /// Chunk bodies in id order; chunk ids start at 1.
    pub chunks: Vec<Vec<u8>>,
    /// Creation time in milliseconds since the epoch.
    pub created: i64,
}

impl MockExport {
    /// Status as reported by the status endpoint.
    pub fn status(&self) -> ExportStatus {
        let total = self.chunks.len() as u64;
        let finished = self.state == ExportState::Finished;
        ExportStatus {
            uuid: Some(self.uuid.clone()),
            status: self.state,
            chunks_available: if finished {
                (1..=total).collect()
            } else {
                Vec::new()
            },
            total_chunks: Some(total),
            finished_chunks: Some(if finished { total } else { 0 }),
            created: Some(self.created),
            ..Default::default()
        }
    }
}

/// Shared state for the mock server.
///
/// This struct holds all the mock data that the server will serve.
/// It's wrapped in `Arc<RwLock<_>>` for concurrent access.
#[derive(Debug)]
pub struct MockState {
    /// Assets in listing order.
    pub assets: Vec<Asset>,

    /// Audit events in listing order.
    pub audit_events: Vec<AuditEvent>,

    /// Records served by asset exports.
    pub exported_assets: Vec<ExportedAsset>,

    /// Records served by vulnerability exports.
    pub exported_vulns: Vec<ExportedVuln>,

    /// Records served by compliance exports.
    pub compliance_findings: Vec<Value>,

    /// Export jobs indexed by UUID.
    pub exports: HashMap<String, MockExport>,

    /// Status calls a job answers with QUEUED/PROCESSING before finishing.
    pub polls_until_ready: u32,

    /// When set, jobs end in ERROR instead of FINISHED.
    pub fail_exports: bool,

    /// When set, listing endpoints report a total of -1.
    pub hide_totals: bool,

    /// Optional `X-APIKeys` header value. If set, requests must include it.
    pub required_keys: Option<String>,

    pub(super) next_export: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            audit_events: Vec::new(),
            exported_assets: Vec::new(),
            exported_vulns: Vec::new(),
            compliance_findings: Vec::new(),
            exports: HashMap::new(),
            polls_until_ready: 2,
            fail_exports: false,
            hide_totals: false,
            required_keys: None,
            next_export: 0,
        }
    }
}

impl MockState {
    /// Create a new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state wrapped in Arc<RwLock> for sharing.
    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    /// Add an asset to the state.
    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    /// Add an audit event to the state.
    pub fn with_audit_event(mut self, event: AuditEvent) -> Self {
        self.audit_events.push(event);
        self
    }

    /// Add a record to asset exports.
    pub fn with_exported_asset(mut self, asset: ExportedAsset) -> Self {
        self.exported_assets.push(asset);
        self
    }

    /// Add a record to vulnerability exports.
    pub fn with_exported_vuln(mut self, vuln: ExportedVuln) -> Self {
        self.exported_vulns.push(vuln);
        self
    }

    /// Set how many polls a job stays pending.
    pub fn with_polls_until_ready(mut self, polls: u32) -> Self {
        self.polls_until_ready = polls;
        self
    }

    /// Make every export job fail.
    pub fn with_failing_exports(mut self) -> Self {
        self.fail_exports = true;
        self
    }

    /// Report unknown totals on listings.
    pub fn with_hidden_totals(mut self) -> Self {
        self.hide_totals = true;
        self
    }

    /// Require API keys on every request.
    pub fn with_required_keys(mut self, access_key: &str, secret_key: &str) -> Self {
        self.required_keys = Some(format!("accessKey={access_key}; secretKey={secret_key}"));
        self
    }

    /// Get an asset by UUID.
    pub fn get_asset(&self, uuid: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == uuid)
    }

    /// List assets, optionally filtered by a `field:value` expression.
    ///
    /// Supported fields are `has_agent`, `hostname` and `ipv4`.
    pub fn list_assets(&self, filter: Option<&str>) -> Vec<&Asset> {
        let filter = filter.and_then(|f| f.split_once(':'));
        self.assets
            .iter()
            .filter(|a| match filter {
                Some(("has_agent", v)) => a.has_agent.to_string() == v,
                Some(("hostname", v)) => a.hostname.iter().any(|h| h == v),
                Some(("ipv4", v)) => a.ipv4.iter().any(|ip| ip == v),
                _ => true,
            })
            .collect()
    }

    /// List audit events matching an `f` filter expression.
    ///
    /// Understands the `actor.id.match` and `action.match` terms; other
    /// terms are accepted and ignored.
    pub fn list_audit_events(&self, filter: Option<&str>) -> Vec<&AuditEvent> {
        let terms: Vec<(&str, &str)> = filter
            .map(|f| f.split(',').filter_map(|t| t.split_once(':')).collect())
            .unwrap_or_default();

        self.audit_events
            .iter()
            .filter(|e| {
                terms.iter().all(|(field, value)| match *field {
                    "actor.id.match" => e.actor.id.as_deref() == Some(*value),
                    "action.match" => e.action == *value,
                    _ => true,
                })
            })
            .collect()
    }

    /// Create an export job and split its records into chunks.
    pub fn create_export(&mut self, kind: ExportKind, chunk_size: usize) -> String {
        self.next_export += 1;
        let uuid = format!("00000000-0000-4000-8000-{:012x}", self.next_export);

        let chunk_size = chunk_size.max(1);
        let chunks = match kind {
            ExportKind::Assets => encode_chunks(&self.exported_assets, chunk_size),
            ExportKind::Vulns => encode_chunks(&self.exported_vulns, chunk_size),
            ExportKind::Compliance => encode_chunks(&self.compliance_findings, chunk_size),
        };

        self.exports.insert(
            uuid.clone(),
            MockExport {
                uuid: uuid.clone(),
                kind,
                state: ExportState::Queued,
                polls: 0,
                chunks,
                created: chrono::Utc::now().timestamp_millis(),
            },
        );
        uuid
    }

    /// Answer a status call, advancing the job one step.
    ///
    /// A job reports QUEUED on its first poll, PROCESSING until
    /// `polls_until_ready` polls have been answered, then its final state.
    pub fn poll_export(&mut self, kind: ExportKind, uuid: &str) -> Option<ExportStatus> {
        let polls_until_ready = self.polls_until_ready;
        let fail = self.fail_exports;
        let export = self.exports.get_mut(uuid).filter(|e| e.kind == kind)?;

        if !export.state.is_terminal() {
            export.state = if export.polls >= polls_until_ready {
                if fail {
                    ExportState::Error
                } else {
                    ExportState::Finished
                }
            } else if export.polls == 0 {
                ExportState::Queued
            } else {
                ExportState::Processing
            };
        }
        export.polls += 1;

        Some(export.status())
    }

    /// Get a chunk of a finished export.
    pub fn export_chunk(&self, kind: ExportKind, uuid: &str, chunk_id: u64) -> Option<&[u8]> {
        let export = self.exports.get(uuid).filter(|e| e.kind == kind)?;
        if export.state != ExportState::Finished {
            return None;
        }
        let index = usize::try_from(chunk_id).ok()?.checked_sub(1)?;
        export.chunks.get(index).map(Vec::as_slice)
    }

    /// Cancel a pending export. Returns false if the job is unknown.
    pub fn cancel_export(&mut self, kind: ExportKind, uuid: &str) -> bool {
        match self.exports.get_mut(uuid).filter(|e| e.kind == kind) {
            Some(export) => {
                if !export.state.is_terminal() {
                    export.state = ExportState::Cancelled;
                }
                true
            }
            None => false,
        }
    }

    /// Statuses of all exports of one kind, oldest first.
    pub fn list_exports(&self, kind: ExportKind) -> Vec<ExportStatus> {
        let mut exports: Vec<&MockExport> =
            self.exports.values().filter(|e| e.kind == kind).collect();
        exports.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        exports.into_iter().map(MockExport::status).collect()
    }
}

fn encode_chunks<T: serde::Serialize>(items: &[T], chunk_size: usize) -> Vec<Vec<u8>> {
    items
        .chunks(chunk_size)
        .map(|chunk| serde_json::to_vec(chunk).unwrap_or_else(|_| b"[]".to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::Fixtures;

    #[test]
    fn test_state_add_and_get_asset() {
        let state = MockState::new().with_asset(Fixtures::asset("a1", "web01", "10.0.0.1"));

        let asset = state.get_asset("a1");
        assert!(asset.is_some());
        assert_eq!(asset.unwrap().hostname, vec!["web01".to_string()]);
        assert!(state.get_asset("missing").is_none());
    }

    #[test]
    fn test_state_list_assets_with_filter() {
        let mut agent = Fixtures::asset("a2", "db01", "10.0.0.2");
        agent.has_agent = true;
        let state = MockState::new()
            .with_asset(Fixtures::asset("a1", "web01", "10.0.0.1"))
            .with_asset(agent)
            .with_asset(Fixtures::asset("a3", "web02", "10.0.0.3"));

        assert_eq!(state.list_assets(None).len(), 3);
        assert_eq!(state.list_assets(Some("has_agent:true")).len(), 1);
        assert_eq!(state.list_assets(Some("hostname:web02"))[0].id, "a3");
    }

    #[test]
    fn test_audit_filter_terms_combine() {
        let state = MockState::new()
            .with_audit_event(Fixtures::audit_event("e1", "user.create", "u-1"))
            .with_audit_event(Fixtures::audit_event("e2", "user.delete", "u-1"))
            .with_audit_event(Fixtures::audit_event("e3", "user.create", "u-2"));

        let events = state.list_audit_events(Some("actor.id.match:u-1,action.match:user.create"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
    }

    #[test]
    fn test_export_advances_with_polls() {
        let mut state = MockState::new().with_polls_until_ready(2);
        for i in 0..5 {
            state = state.with_exported_asset(Fixtures::exported_asset(&format!("x{i}")));
        }
        let uuid = state.create_export(ExportKind::Assets, 2);

        let states: Vec<ExportState> = (0..4)
            .map(|_| state.poll_export(ExportKind::Assets, &uuid).unwrap().status)
            .collect();
        assert_eq!(
            states,
            vec![
                ExportState::Queued,
                ExportState::Processing,
                ExportState::Finished,
                ExportState::Finished
            ]
        );

        let status = state.poll_export(ExportKind::Assets, &uuid).unwrap();
        assert_eq!(status.chunks_available, vec![1, 2, 3]);
        assert!(state.export_chunk(ExportKind::Assets, &uuid, 3).is_some());
        assert!(state.export_chunk(ExportKind::Assets, &uuid, 4).is_none());
        assert!(state.export_chunk(ExportKind::Vulns, &uuid, 1).is_none());
    }

    #[test]
    fn test_cancelled_export_stays_cancelled() {
        let mut state = MockState::new();
        let uuid = state.create_export(ExportKind::Vulns, 10);

        assert!(state.cancel_export(ExportKind::Vulns, &uuid));
        for _ in 0..5 {
            let status = state.poll_export(ExportKind::Vulns, &uuid).unwrap();
            assert_eq!(status.status, ExportState::Cancelled);
        }
        assert!(!state.cancel_export(ExportKind::Vulns, "unknown"));
    }
}
