//! Audit log events.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::client::TioClient;
use crate::error::Result;
use crate::pagination::{FetchedPage, PaginationInfo};
use crate::traits::List;

/// A single audit log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,

    /// Action name (e.g. "user.authenticate.password").
    pub action: String,

    /// CRUD classification of the action ("c", "r", "u" or "d").
    #[serde(default)]
    pub crud: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub fields: Vec<AuditField>,

    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default)]
    pub is_failure: bool,

    /// When the event was recorded.
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,

    #[serde(default)]
    pub target: AuditTarget,

    #[serde(default)]
    pub actor: AuditActor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditField {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTarget {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditActor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Filters for listing audit events.
///
/// Set fields are combined into the endpoint's `f` filter expression.
#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    /// Only events received after this time.
    pub from_date: Option<DateTime<Utc>>,
    /// Only events received before this time.
    pub to_date: Option<DateTime<Utc>>,
    /// Actor id to match.
    pub actor: Option<String>,
    /// Target id to match.
    pub target: Option<String>,
    /// Action name to match.
    pub action: Option<String>,
}

impl AuditLogQuery {
    /// Build the `f` filter expression, or `None` if no filter is set.
    pub fn filter_expression(&self) -> Option<String> {
        let mut filters = Vec::new();

        if let Some(from) = &self.from_date {
            filters.push(format!(
                "date.gt:{}",
                from.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if let Some(to) = &self.to_date {
            filters.push(format!(
                "date.lt:{}",
                to.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if let Some(actor) = &self.actor {
            filters.push(format!("actor.id.match:{actor}"));
        }
        if let Some(target) = &self.target {
            filters.push(format!("target.id.match:{target}"));
        }
        if let Some(action) = &self.action {
            filters.push(format!("action.match:{action}"));
        }

        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuditLogResponse {
    #[serde(default)]
    events: Option<Box<RawValue>>,
    #[serde(default)]
    pagination: Option<PaginationInfo>,
}

#[async_trait]
impl List for AuditEvent {
    type Query = AuditLogQuery;

    #[tracing::instrument(skip(client))]
    async fn list_page(
        client: &TioClient,
        query: &Self::Query,
        offset: u64,
        limit: u32,
    ) -> Result<FetchedPage> {
        #[derive(Serialize)]
        struct RequestParams {
            limit: u32,
            offset: u64,
            #[serde(skip_serializing_if = "Option::is_none")]
            f: Option<String>,
        }

        let params = RequestParams {
            limit,
            offset,
            f: query.filter_expression(),
        };

        let data: AuditLogResponse = client
            .get_with_query("audit-log/v1/events", &params)
            .await?;
        let items = data
            .events
            .map_or_else(Vec::new, |raw| raw.get().as_bytes().to_vec());

        Ok(FetchedPage::new(items, data.pagination))
    }
}
