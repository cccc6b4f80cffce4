//! Test data fixtures for the mock server.
//!
//! Provides factory functions for creating realistic test data.

use chrono::{TimeZone, Utc};

use crate::{
    Asset, AssetSource, AuditActor, AuditEvent, AuditTarget, ExportedAsset, ExportedVuln,
    VulnAsset, VulnPlugin, VulnPort,
};

/// Collection of fixture factories for test data.
pub struct Fixtures;

impl Fixtures {
    // =========================================================================
    // Asset Fixtures
    // =========================================================================

    /// Create an asset with one hostname and one IPv4 address.
    pub fn asset(id: &str, hostname: &str, ipv4: &str) -> Asset {
        Asset {
            id: id.to_string(),
            has_agent: false,
            has_plugin_results: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            updated_at: None,
            first_seen: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            last_seen: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single(),
            last_scan_time: None,
            terminated_at: None,
            deleted_at: None,
            hostname: vec![hostname.to_string()],
            fqdn: vec![],
            ipv4: vec![ipv4.to_string()],
            ipv6: vec![],
            mac_address: vec![],
            netbios_name: vec![],
            operating_system: vec!["Linux Kernel 5.15".to_string()],
            system_type: vec!["general-purpose".to_string()],
            agent_name: vec![],
            network_name: Some("Default".to_string()),
            sources: vec![AssetSource {
                name: "NESSUS_SCAN".to_string(),
                first_seen: None,
                last_seen: None,
            }],
            tags: vec![],
            acr_score: None,
            exposure_score: None,
        }
    }

    /// Create `count` numbered assets on 10.0.0.0/24.
    pub fn numbered_assets(count: usize) -> Vec<Asset> {
        (1..=count)
            .map(|i| {
                Self::asset(
                    &format!("00000000-0000-4000-a000-{i:012}"),
                    &format!("host{i:03}"),
                    &format!("10.0.0.{}", i % 256),
                )
            })
            .collect()
    }

    // =========================================================================
    // Audit Log Fixtures
    // =========================================================================

    /// Create an audit event performed by `actor_id`.
    pub fn audit_event(id: &str, action: &str, actor_id: &str) -> AuditEvent {
        AuditEvent {
            id: id.to_string(),
            action: action.to_string(),
            crud: Some("c".to_string()),
            description: None,
            fields: vec![],
            is_anonymous: false,
            is_failure: false,
            received: Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).single(),
            target: AuditTarget {
                id: Some("t-1".to_string()),
                target_type: Some("User".to_string()),
                name: None,
            },
            actor: AuditActor {
                id: Some(actor_id.to_string()),
                name: Some(format!("{actor_id}@example.com")),
            },
        }
    }

    // =========================================================================
    // Export Fixtures
    // =========================================================================

    /// Create an exported asset record.
    pub fn exported_asset(id: &str) -> ExportedAsset {
        ExportedAsset {
            id: id.to_string(),
            has_agent: true,
            has_plugin_results: true,
            created_at: None,
            updated_at: None,
            first_seen: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            last_seen: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single(),
            terminated_at: None,
            deleted_at: None,
            sources: vec![],
            tags: vec![],
            network_interfaces: vec![],
            fqdn: vec![format!("{id}.example.com")],
            hostname: vec![id.to_string()],
            ipv4: vec![],
            ipv6: vec![],
            mac_address: vec![],
            operating_system: vec![],
        }
    }

    /// Create an open vulnerability finding on `asset_uuid`.
    pub fn exported_vuln(asset_uuid: &str, plugin_id: u64, severity: &str) -> ExportedVuln {
        ExportedVuln {
            asset: VulnAsset {
                uuid: asset_uuid.to_string(),
                hostname: Some(format!("{asset_uuid}.example.com")),
                fqdn: None,
                ipv4: None,
                operating_system: vec![],
                network_id: None,
            },
            plugin: VulnPlugin {
                id: plugin_id,
                name: format!("Plugin {plugin_id}"),
                family: Some("General".to_string()),
                description: None,
                solution: None,
                synopsis: None,
                risk_factor: Some(severity.to_string()),
                has_patch: false,
                cve: vec![],
                vpr_score: None,
                cvss_base_score: None,
                cvss3_base_score: None,
            },
            port: Some(VulnPort {
                port: 443,
                protocol: Some("TCP".to_string()),
                service: Some("www".to_string()),
            }),
            scan: None,
            severity: severity.to_string(),
            severity_id: 2,
            state: "OPEN".to_string(),
            output: None,
            first_found: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).single(),
            last_found: None,
            last_fixed: None,
            indexed_at: None,
        }
    }

    /// Create a default set of test data for common scenarios.
    pub fn default_scenario() -> DefaultScenario {
        let assets = Self::numbered_assets(5);

        let audit_events = vec![
            Self::audit_event("e1", "user.authenticate.password", "u-1"),
            Self::audit_event("e2", "user.create", "u-1"),
            Self::audit_event("e3", "scan.launch", "u-2"),
        ];

        let exported_assets = (1..=5)
            .map(|i| Self::exported_asset(&format!("export-asset-{i}")))
            .collect();

        let exported_vulns = assets
            .iter()
            .enumerate()
            .map(|(i, a)| Self::exported_vuln(&a.id, 19506 + i as u64, "medium"))
            .collect();

        DefaultScenario {
            assets,
            audit_events,
            exported_assets,
            exported_vulns,
        }
    }
}

/// A complete test scenario with related entities.
pub struct DefaultScenario {
    pub assets: Vec<Asset>,
    pub audit_events: Vec<AuditEvent>,
    pub exported_assets: Vec<ExportedAsset>,
    pub exported_vulns: Vec<ExportedVuln>,
}
