//! Keitaro admin API client.
//!
//! Issues `report/build` queries against a Keitaro instance's admin API,
//! authenticated with an `Api-Key` header. The report endpoint takes the
//! grouping dimensions, metric names and equality filters verbatim, so the
//! dynamic row shape downstream mirrors exactly what was requested here.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::Deserialize;

use crate::config::TrackerConfig;
use crate::errors::{Error, Result};
use crate::models::fields::{DAY, DEFAULT_METRICS, IDENTITY_TAG};
use crate::models::Row;
use crate::tracker::{ReportQuery, TrackerReport, TrackerReportSource};

/// Report rows beyond this are cut off by the tracker; one page is enough for
/// the date ranges this system queries.
const REPORT_LIMIT: u32 = 20_000;

/// Timezone the tracker buckets days in.
const REPORT_TIMEZONE: &str = "Europe/Moscow";

/// An offer as listed by the tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    summary: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Keitaro tracker client.
#[derive(Debug, Clone)]
pub struct KeitaroClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl KeitaroClient {
    /// Creates a client for a tracker instance reachable at `https://{domain}`.
    pub fn new(domain: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://{domain}/admin_api/v1"),
            api_key: api_key.into(),
        }
    }

    /// Creates a client from configuration.
    ///
    /// An unconfigured tracker is an upstream-unavailable condition: callers
    /// find out when they ask for a report, not at startup.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::UpstreamUnavailable(
                "tracker domain or API key not configured".to_string(),
            ));
        }
        Ok(Self::new(&config.domain, config.api_key.clone()))
    }

    /// Overrides the base URL (scheme and host included). Used by tests to
    /// point the client at a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Lists the offers configured in the tracker.
    pub async fn list_offers(&self) -> Result<Vec<Offer>> {
        let url = format!("{}/offers", self.base_url);
        let offers = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<Vec<Offer>>()
            .await
            .map_err(unavailable)?;
        Ok(offers)
    }
}

#[async_trait::async_trait]
impl TrackerReportSource for KeitaroClient {
    async fn fetch_report(&self, query: &ReportQuery) -> Result<TrackerReport> {
        let grouping: Vec<String> = if query.grouping.is_empty() {
            vec![IDENTITY_TAG.to_string(), DAY.to_string()]
        } else {
            query.grouping.clone()
        };
        let metrics: Vec<String> = if query.metrics.is_empty() {
            DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
        } else {
            query.metrics.clone()
        };

        let body = serde_json::json!({
            "range": {
                "interval": "custom_date_range",
                "from": format!("{} 0:00", query.date_from),
                "to": format!("{} 23:59", query.date_to),
                "timezone": REPORT_TIMEZONE,
            },
            "limit": REPORT_LIMIT,
            "offset": 0,
            "metrics": metrics,
            "filters": query.filters,
            "summary": true,
            "grouping": grouping,
            "extended": true,
            "columns": [],
        });

        let url = format!("{}/report/build", self.base_url);
        tracing::debug!(%url, from = %query.date_from, to = %query.date_to, "Fetching tracker report");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<ReportResponse>()
            .await
            .map_err(unavailable)?;

        let rows: Vec<Row> = response.rows.iter().map(Row::from_json_map).collect();
        let summary = response.summary.map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                .collect::<BTreeMap<String, f64>>()
        });

        tracing::debug!(rows = rows.len(), "Tracker report fetched");
        Ok(TrackerReport { rows, summary })
    }

    fn name(&self) -> &str {
        "keitaro"
    }
}

fn unavailable(err: reqwest::Error) -> Error {
    Error::UpstreamUnavailable(err.to_string())
}
