//! Export request bodies and the records found in export chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TioError};
use crate::jobs::{ExportKind, ExportRequest};
use crate::models::asset::{AssetSource, AssetTag};

/// Default assets per chunk for asset exports.
pub const DEFAULT_ASSET_CHUNK_SIZE: u32 = 1000;

/// Default assets per chunk for vulnerability and compliance exports.
pub const DEFAULT_NUM_ASSETS: u32 = 500;

fn check_range(field: &'static str, value: Option<u32>, min: u32, max: u32) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(TioError::Validation {
            field,
            message: format!("must be between {min} and {max}, got {v}"),
        }),
        _ => Ok(()),
    }
}

/// Body of `POST assets/export`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetExportRequest {
    /// Assets per chunk (100-10000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u32>,

    /// Export filters, passed through unchanged.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, Value>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_unlicensed: bool,
}

impl ExportRequest for AssetExportRequest {
    const KIND: ExportKind = ExportKind::Assets;
    type Item = ExportedAsset;

    fn apply_defaults(&mut self) {
        self.chunk_size.get_or_insert(DEFAULT_ASSET_CHUNK_SIZE);
    }

    fn validate(&self) -> Result<()> {
        check_range("chunk_size", self.chunk_size, 100, 10_000)
    }
}

/// Body of `POST vulns/export`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VulnExportRequest {
    /// Assets per chunk (50-5000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_assets: Option<u32>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, Value>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_unlicensed: bool,
}

impl ExportRequest for VulnExportRequest {
    const KIND: ExportKind = ExportKind::Vulns;
    type Item = ExportedVuln;

    fn apply_defaults(&mut self) {
        self.num_assets.get_or_insert(DEFAULT_NUM_ASSETS);
    }

    fn validate(&self) -> Result<()> {
        check_range("num_assets", self.num_assets, 50, 5_000)
    }
}

/// Body of `POST compliance/export`.
///
/// Compliance findings vary by audit type and are yielded as raw JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceExportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_assets: Option<u32>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, Value>,
}

impl ExportRequest for ComplianceExportRequest {
    const KIND: ExportKind = ExportKind::Compliance;
    type Item = Value;

    fn apply_defaults(&mut self) {
        self.num_assets.get_or_insert(DEFAULT_NUM_ASSETS);
    }

    fn validate(&self) -> Result<()> {
        check_range("num_assets", self.num_assets, 50, 10_000)
    }
}

/// An asset record from an asset export chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAsset {
    pub id: String,
    #[serde(default)]
    pub has_agent: bool,
    #[serde(default)]
    pub has_plugin_results: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terminated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sources: Vec<AssetSource>,
    #[serde(default)]
    pub tags: Vec<AssetTag>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub fqdn: Vec<String>,
    #[serde(default)]
    pub hostname: Vec<String>,
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub ipv6: Vec<String>,
    #[serde(default)]
    pub mac_address: Vec<String>,
    #[serde(default)]
    pub operating_system: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub ipv6: Vec<String>,
    #[serde(default)]
    pub mac_address: Vec<String>,
}

/// A vulnerability finding from a vulnerability export chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedVuln {
    /// The affected asset, abbreviated.
    pub asset: VulnAsset,

    pub plugin: VulnPlugin,

    #[serde(default)]
    pub port: Option<VulnPort>,

    #[serde(default)]
    pub scan: Option<VulnScan>,

    /// Severity name ("info", "low", "medium", "high", "critical").
    pub severity: String,

    #[serde(default)]
    pub severity_id: u8,

    /// Finding state ("OPEN", "REOPENED", "FIXED").
    pub state: String,

    /// Plugin output for this finding.
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub first_found: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_found: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_fixed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl ExportedVuln {
    /// Returns true unless the finding has been fixed.
    pub fn is_open(&self) -> bool {
        !self.state.eq_ignore_ascii_case("fixed")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnAsset {
    #[serde(alias = "id")]
    pub uuid: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub ipv4: Option<String>,
    #[serde(default)]
    pub operating_system: Vec<String>,
    #[serde(default)]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnPlugin {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub risk_factor: Option<String>,
    #[serde(default)]
    pub has_patch: bool,
    #[serde(default)]
    pub cve: Vec<String>,
    #[serde(default)]
    pub vpr_score: Option<f64>,
    #[serde(default)]
    pub cvss_base_score: Option<f64>,
    #[serde(default)]
    pub cvss3_base_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnPort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnScan {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub schedule_uuid: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_unset_sizes() {
        let mut assets = AssetExportRequest::default();
        assets.apply_defaults();
        assert_eq!(assets.chunk_size, Some(1000));

        let mut vulns = VulnExportRequest {
            num_assets: Some(50),
            ..Default::default()
        };
        vulns.apply_defaults();
        assert_eq!(vulns.num_assets, Some(50));
    }

    #[test]
    fn test_out_of_range_sizes_rejected() {
        let request = AssetExportRequest {
            chunk_size: Some(50_000),
            ..Default::default()
        };
        let err = request.validate().unwrap_err();
        assert!(matches!(
            err,
            TioError::Validation {
                field: "chunk_size",
                ..
            }
        ));

        let request = VulnExportRequest {
            num_assets: Some(10),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_body_omits_empty_fields() {
        let mut request = VulnExportRequest::default();
        request.apply_defaults();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"num_assets": 500})
        );

        let mut filters = Map::new();
        filters.insert("severity".to_string(), serde_json::json!(["high", "critical"]));
        let request = VulnExportRequest {
            filters,
            include_unlicensed: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "filters": {"severity": ["high", "critical"]},
                "include_unlicensed": true
            })
        );
    }

    #[test]
    fn test_exported_vuln_deserializes() {
        let vuln: ExportedVuln = serde_json::from_value(serde_json::json!({
            "asset": {"uuid": "a1", "hostname": "web01", "ipv4": "10.0.0.5"},
            "plugin": {"id": 19506, "name": "Nessus Scan Information", "cve": []},
            "port": {"port": 443, "protocol": "TCP"},
            "severity": "info",
            "severity_id": 0,
            "state": "OPEN",
            "first_found": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(vuln.asset.uuid, "a1");
        assert_eq!(vuln.plugin.id, 19506);
        assert!(vuln.is_open());
        assert_eq!(vuln.port.map(|p| p.port), Some(443));
    }
}
