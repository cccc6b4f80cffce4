//! Asset model and trait implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::client::TioClient;
use crate::error::Result;
use crate::pagination::{FetchedPage, PaginationInfo};
use crate::traits::{Get, List};

/// An asset known to Tenable Vulnerability Management.
///
/// Hosts can carry several names and addresses, so most identity fields
/// are lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// The asset UUID.
    pub id: String,

    /// Whether a Nessus agent is installed.
    #[serde(default)]
    pub has_agent: bool,

    /// Whether any scan produced plugin results for this asset.
    #[serde(default)]
    pub has_plugin_results: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// When the asset was first observed.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,

    /// When the asset was last observed.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_scan_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub terminated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub hostname: Vec<String>,

    #[serde(default)]
    pub fqdn: Vec<String>,

    #[serde(default)]
    pub ipv4: Vec<String>,

    #[serde(default)]
    pub ipv6: Vec<String>,

    #[serde(default)]
    pub mac_address: Vec<String>,

    #[serde(default)]
    pub netbios_name: Vec<String>,

    #[serde(default)]
    pub operating_system: Vec<String>,

    #[serde(default)]
    pub system_type: Vec<String>,

    #[serde(default)]
    pub agent_name: Vec<String>,

    /// Network the asset belongs to.
    #[serde(default)]
    pub network_name: Option<String>,

    /// Sources that reported this asset (e.g. "NESSUS_SCAN", "AWS").
    #[serde(default)]
    pub sources: Vec<AssetSource>,

    #[serde(default)]
    pub tags: Vec<AssetTag>,

    /// Asset Criticality Rating (1-10).
    #[serde(default)]
    pub acr_score: Option<u32>,

    /// Asset Exposure Score (0-1000).
    #[serde(default)]
    pub exposure_score: Option<u32>,
}

/// A source that reported an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSource {
    pub name: String,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A tag applied to an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTag {
    #[serde(default)]
    pub tag_uuid: Option<String>,
    pub tag_key: String,
    pub tag_value: String,
    #[serde(default)]
    pub added_by: Option<String>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Best display name: first FQDN, then hostname, then IPv4 address.
    pub fn display_name(&self) -> Option<&str> {
        self.fqdn
            .first()
            .or_else(|| self.hostname.first())
            .or_else(|| self.ipv4.first())
            .map(String::as_str)
    }

    /// Returns true if the asset has been terminated or deleted.
    pub fn is_retired(&self) -> bool {
        self.terminated_at.is_some() || self.deleted_at.is_some()
    }
}

/// Query parameters for listing assets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetListQuery {
    /// Only include assets seen within this many days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<u32>,

    /// Filter expression understood by the assets endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// API response wrapper for listing assets.
///
/// Items stay raw so the paginator's decoder sees the original bytes.
#[derive(Debug, Deserialize)]
struct AssetListResponse {
    #[serde(default)]
    assets: Option<Box<RawValue>>,
    #[serde(default)]
    total: Option<i64>,
}

#[async_trait]
impl Get for Asset {
    type Id = String; // Asset UUID

    #[tracing::instrument(skip(client))]
    async fn get(client: &TioClient, uuid: String) -> Result<Self> {
        let path = format!("assets/{}", urlencoding::encode(&uuid));
        client.get(&path).await
    }
}

#[async_trait]
impl List for Asset {
    type Query = AssetListQuery;

    #[tracing::instrument(skip(client))]
    async fn list_page(
        client: &TioClient,
        query: &Self::Query,
        offset: u64,
        limit: u32,
    ) -> Result<FetchedPage> {
        #[derive(Serialize)]
        struct RequestParams<'a> {
            #[serde(flatten)]
            query: &'a AssetListQuery,
            limit: u32,
            offset: u64,
        }

        let params = RequestParams {
            query,
            limit,
            offset,
        };

        let data: AssetListResponse = client.get_with_query("assets", &params).await?;
        let pagination = PaginationInfo {
            total: data.total.and_then(|t| u64::try_from(t).ok()),
            limit,
            offset,
        };
        let items = data.assets.map_or_else(Vec::new, |raw| raw.get().as_bytes().to_vec());

        Ok(FetchedPage::new(items, Some(pagination)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_deserializes_sparse_record() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "has_agent": true,
            "ipv4": ["10.0.0.5"],
            "last_seen": "2024-03-01T12:00:00Z",
            "sources": [{"name": "NESSUS_SCAN"}]
        }))
        .unwrap();

        assert_eq!(asset.id, "a1");
        assert!(asset.has_agent);
        assert_eq!(asset.display_name(), Some("10.0.0.5"));
        assert!(asset.last_seen.is_some());
        assert!(asset.hostname.is_empty());
        assert!(!asset.is_retired());
    }

    #[test]
    fn test_display_name_prefers_fqdn() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "id": "a2",
            "fqdn": ["web01.example.com"],
            "hostname": ["web01"],
            "ipv4": ["10.0.0.6"]
        }))
        .unwrap();
        assert_eq!(asset.display_name(), Some("web01.example.com"));
    }

    #[test]
    fn test_list_response_keeps_raw_items() {
        let data: AssetListResponse =
            serde_json::from_str(r#"{"assets": [{"id": "a1"}, {"id": "a2"}], "total": 2}"#).unwrap();
        assert_eq!(data.total, Some(2));
        assert_eq!(data.assets.unwrap().get(), r#"[{"id": "a1"}, {"id": "a2"}]"#);
    }

    #[test]
    fn test_query_omits_unset_fields() {
        let query = AssetListQuery {
            filter: Some("has_agent:true".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, serde_json::json!({"filter": "has_agent:true"}));
    }
}
