use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::Result;
use crate::models::Row;

/// Equality filter on a tracker report field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFilter {
    #[serde(rename = "name")]
    pub field: String,
    #[serde(rename = "operator")]
    pub op: FilterOp,
    #[serde(rename = "expression")]
    pub value: serde_json::Value,
}

impl ReportFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOp {
    #[serde(rename = "EQUALS")]
    Equals,
}

/// A grouped, filtered, date-ranged report query against the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub date_from: NaiveDate,
    /// Inclusive upper bound.
    pub date_to: NaiveDate,
    pub grouping: Vec<String>,
    pub metrics: Vec<String>,
    pub filters: Vec<ReportFilter>,
}

/// What the tracker returns: ordered rows keyed by the requested grouping
/// dimensions and metrics, plus its own summary when it computed one.
///
/// The tracker summary never covers `spend`; the reconciliation engine always
/// recomputes that side itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerReport {
    pub rows: Vec<Row>,
    pub summary: Option<BTreeMap<String, f64>>,
}

/// Source of tracker performance reports.
#[async_trait::async_trait]
pub trait TrackerReportSource: Send + Sync {
    async fn fetch_report(&self, query: &ReportQuery) -> Result<TrackerReport>;

    fn name(&self) -> &str;
}

/// Canned report source for tests: returns a fixed report and records the
/// queries it was asked for.
#[derive(Default)]
pub struct StaticReportSource {
    report: TrackerReport,
    queries: Mutex<Vec<ReportQuery>>,
}

impl StaticReportSource {
    pub fn new(report: TrackerReport) -> Self {
        Self {
            report,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<ReportQuery> {
        self.queries.lock().expect("query log lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl TrackerReportSource for StaticReportSource {
    async fn fetch_report(&self, query: &ReportQuery) -> Result<TrackerReport> {
        self.queries
            .lock()
            .expect("query log lock poisoned")
            .push(query.clone());
        Ok(self.report.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
