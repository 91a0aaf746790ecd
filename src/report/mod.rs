//! The reconciliation engine.
//!
//! Joins tracker performance rows with ledger spend rows on a caller-selected
//! composite grouping key, derives profit, and recomputes the summary. The
//! tracker side drives the join; ledger rows with no tracked activity are
//! appended afterwards so manually entered spend never silently disappears
//! from a report.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::errors::{Error, Result};
use crate::ledger::{LedgerQuery, LedgerService};
use crate::models::fields::{DAY, DEFAULT_METRICS, IDENTITY_TAG, OFFER_ID, PROFIT, REVENUE, SPEND};
use crate::models::{round2, ReportResult, Row};
use crate::tracker::{ReportFilter, ReportQuery, TrackerReport, TrackerReportSource};

/// Which sources feed the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Tracker rows only.
    ExternalOnly,
    /// Ledger rows only.
    LedgerOnly,
    /// Tracker rows left-joined with ledger spend, plus unmatched ledger rows.
    Combined,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Grouping dimensions; they define both the join key and what counts as
    /// a distinct output row. Empty means group by day.
    pub grouping: Vec<String>,
    pub offer_id: Option<i64>,
    pub identity: Option<String>,
    /// Tracker metrics to request. Empty means the default metric set.
    pub metrics: Vec<String>,
    pub mode: ReportMode,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            grouping: Vec::new(),
            offer_id: None,
            identity: None,
            metrics: Vec::new(),
            mode: ReportMode::Combined,
        }
    }
}

/// Reconciliation service over a tracker source and the spend ledger.
#[derive(Clone)]
pub struct ReportService {
    tracker: Arc<dyn TrackerReportSource>,
    ledger: LedgerService,
}

impl ReportService {
    pub fn new(tracker: Arc<dyn TrackerReportSource>, ledger: LedgerService) -> Self {
        Self { tracker, ledger }
    }

    pub async fn reconcile(&self, request: &ReportRequest) -> Result<ReportResult> {
        let (date_from, date_to) = resolve_range(request.date_from, request.date_to)?;
        let grouping: Vec<String> = if request.grouping.is_empty() {
            vec![DAY.to_string()]
        } else {
            request.grouping.clone()
        };
        let metrics: Vec<String> = if request.metrics.is_empty() {
            DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
        } else {
            request.metrics.clone()
        };

        match request.mode {
            ReportMode::LedgerOnly => {
                self.ledger
                    .report(&ledger_query(request, date_from, date_to, &grouping))
                    .await
            }
            ReportMode::ExternalOnly => {
                let report = self
                    .fetch_tracker(request, date_from, date_to, &grouping, &metrics)
                    .await?;
                Ok(finish(report.rows, report.summary, &grouping, &metrics))
            }
            ReportMode::Combined => {
                // Independent reads; the join waits for both and no partial
                // combination is ever produced.
                let query = ledger_query(request, date_from, date_to, &grouping);
                let (tracker, ledger_rows) = tokio::join!(
                    self.fetch_tracker(request, date_from, date_to, &grouping, &metrics),
                    self.ledger.query_rows(&query),
                );
                let tracker = tracker?;
                let ledger_rows = ledger_rows?;
                tracing::debug!(
                    tracker_rows = tracker.rows.len(),
                    ledger_rows = ledger_rows.len(),
                    "Joining tracker and ledger rows"
                );
                let rows = join_rows(tracker.rows, ledger_rows, &grouping);
                Ok(finish(rows, tracker.summary, &grouping, &metrics))
            }
        }
    }

    async fn fetch_tracker(
        &self,
        request: &ReportRequest,
        date_from: NaiveDate,
        date_to: NaiveDate,
        grouping: &[String],
        metrics: &[String],
    ) -> Result<TrackerReport> {
        let mut filters = Vec::new();
        if let Some(offer_id) = request.offer_id {
            filters.push(ReportFilter::equals(OFFER_ID, offer_id));
        }
        if let Some(identity) = &request.identity {
            filters.push(ReportFilter::equals(IDENTITY_TAG, identity.clone()));
        }
        let query = ReportQuery {
            date_from,
            date_to,
            grouping: grouping.to_vec(),
            metrics: metrics.to_vec(),
            filters,
        };
        self.tracker.fetch_report(&query).await
    }
}

fn ledger_query(
    request: &ReportRequest,
    date_from: NaiveDate,
    date_to: NaiveDate,
    grouping: &[String],
) -> LedgerQuery {
    LedgerQuery {
        date_from: Some(date_from),
        date_to: Some(date_to),
        offer_id: request.offer_id,
        identity: request.identity.clone(),
        grouping: grouping.to_vec(),
    }
}

/// Resolve the requested bounds into an inclusive range.
///
/// At least one bound must be supplied; the missing side defaults to the
/// other, so a single date means exactly that day.
fn resolve_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(NaiveDate, NaiveDate)> {
    match (from, to) {
        (None, None) => Err(Error::InvalidRange(
            "a date or date range is required".to_string(),
        )),
        (Some(from), None) => Ok((from, from)),
        (None, Some(to)) => Ok((to, to)),
        (Some(from), Some(to)) if from > to => Err(Error::InvalidRange(format!(
            "start {from} is after end {to}"
        ))),
        (Some(from), Some(to)) => Ok((from, to)),
    }
}

/// Left join with the tracker side driving.
///
/// Every tracker row appears exactly once, with the matching ledger row's
/// spend attached (0 when absent). Ledger rows whose key never matched are
/// appended afterwards, preserving their order: the recovery step for spend
/// on offers or identities with zero tracked activity.
fn join_rows(tracker_rows: Vec<Row>, ledger_rows: Vec<Row>, grouping: &[String]) -> Vec<Row> {
    let ledger_keys: Vec<String> = ledger_rows
        .iter()
        .map(|row| row.composite_key(grouping))
        .collect();
    let mut spend_by_key: HashMap<&str, f64> = HashMap::with_capacity(ledger_rows.len());
    for (key, row) in ledger_keys.iter().zip(ledger_rows.iter()) {
        spend_by_key
            .entry(key)
            .or_insert_with(|| row.number(SPEND).unwrap_or(0.0));
    }

    let mut matched: HashSet<String> = HashSet::with_capacity(tracker_rows.len());
    let mut out = Vec::with_capacity(tracker_rows.len() + ledger_rows.len());
    for mut row in tracker_rows {
        let key = row.composite_key(grouping);
        let spend = spend_by_key.get(key.as_str()).copied().unwrap_or(0.0);
        row.set(SPEND, spend);
        matched.insert(key);
        out.push(row);
    }

    drop(spend_by_key);
    for (key, row) in ledger_keys.into_iter().zip(ledger_rows.into_iter()) {
        if !matched.contains(&key) {
            out.push(row);
        }
    }
    out
}

/// Normalization, derived metrics and summary (steps shared by the external
/// and combined modes).
fn finish(
    mut rows: Vec<Row>,
    tracker_summary: Option<BTreeMap<String, f64>>,
    grouping: &[String],
    metrics: &[String],
) -> ReportResult {
    // Missing metrics become 0 so absence never propagates into arithmetic.
    for row in &mut rows {
        for field in metrics.iter().map(String::as_str).chain([SPEND]) {
            if !row.contains(field) {
                row.set(field, 0.0);
            }
        }
        if let (Some(revenue), Some(spend)) = (row.number(REVENUE), row.number(SPEND)) {
            row.set(PROFIT, revenue - spend);
        }
    }

    // Only declared metrics and derived fields are summable. Grouping
    // dimensions stay out of the summary even when numeric, so a numeric
    // offer id is never added up as if it were a metric.
    let mut summable: Vec<&str> = Vec::with_capacity(metrics.len() + 2);
    for metric in metrics {
        if !summable.contains(&metric.as_str()) {
            summable.push(metric.as_str());
        }
    }
    if !summable.contains(&SPEND) {
        summable.push(SPEND);
    }
    if metrics.iter().any(|m| m == REVENUE) {
        summable.push(PROFIT);
    }

    let mut summary = BTreeMap::new();
    for field in summable {
        if grouping.iter().any(|dim| dim == field) {
            continue;
        }
        // Spend and profit are this engine's own join results; the tracker
        // summary knows nothing about them and is never trusted for them.
        let value = if field == SPEND || field == PROFIT {
            sum_field(&rows, field)
        } else {
            tracker_summary
                .as_ref()
                .and_then(|s| s.get(field).copied())
                .unwrap_or_else(|| sum_field(&rows, field))
        };
        summary.insert(field.to_string(), round2(value));
    }

    ReportResult { rows, summary }
}

fn sum_field(rows: &[Row], field: &str) -> f64 {
    rows.iter().filter_map(|row| row.number(field)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn range_requires_at_least_one_bound() {
        assert!(matches!(
            resolve_range(None, None),
            Err(Error::InvalidRange(_))
        ));
        assert_eq!(
            resolve_range(Some(date("2024-01-01")), None).unwrap(),
            (date("2024-01-01"), date("2024-01-01"))
        );
        assert_eq!(
            resolve_range(None, Some(date("2024-01-02"))).unwrap(),
            (date("2024-01-02"), date("2024-01-02"))
        );
        assert!(matches!(
            resolve_range(Some(date("2024-02-01")), Some(date("2024-01-01"))),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn join_attaches_spend_and_recovers_unmatched_ledger_rows() {
        let tracker = vec![
            row(&[
                ("day", Value::from("2024-01-01")),
                ("revenue", Value::from(200.0)),
            ]),
            row(&[
                ("day", Value::from("2024-01-02")),
                ("revenue", Value::from(100.0)),
            ]),
        ];
        let ledger = vec![
            row(&[
                ("day", Value::from("2024-01-02")),
                ("spend", Value::from(40.0)),
            ]),
            row(&[
                ("day", Value::from("2024-01-03")),
                ("spend", Value::from(15.0)),
            ]),
        ];

        let joined = join_rows(tracker, ledger, &dims(&["day"]));
        assert_eq!(joined.len(), 3);
        // Driving-side order preserved, recovered row appended last.
        assert_eq!(joined[0].number("spend"), Some(0.0));
        assert_eq!(joined[1].number("spend"), Some(40.0));
        assert_eq!(joined[2].get("day").unwrap().key_part(), "2024-01-03");
        assert_eq!(joined[2].number("spend"), Some(15.0));
    }

    #[test]
    fn finish_normalizes_missing_metrics_and_derives_profit() {
        let rows = vec![row(&[
            ("day", Value::from("2024-01-01")),
            ("spend", Value::from(30.0)),
        ])];
        let metrics = dims(&["clicks", "revenue"]);
        let result = finish(rows, None, &dims(&["day"]), &metrics);

        let row = &result.rows[0];
        assert_eq!(row.number("revenue"), Some(0.0));
        assert_eq!(row.number("clicks"), Some(0.0));
        assert_eq!(row.number("profit"), Some(-30.0));
    }

    #[test]
    fn summary_recomputes_spend_and_keeps_tracker_metric_totals() {
        let rows = vec![
            row(&[
                ("day", Value::from("2024-01-01")),
                ("revenue", Value::from(200.0)),
                ("spend", Value::from(120.0)),
            ]),
            row(&[
                ("day", Value::from("2024-01-02")),
                ("revenue", Value::from(100.0)),
                ("spend", Value::from(0.0)),
            ]),
        ];
        // The tracker's own summary claims a bogus spend total and a revenue
        // total that differs from the row sum (extended stats can do that).
        let tracker_summary: BTreeMap<String, f64> =
            [("revenue".to_string(), 310.0), ("spend".to_string(), 9.0)]
                .into_iter()
                .collect();

        let result = finish(
            rows,
            Some(tracker_summary),
            &dims(&["day"]),
            &dims(&["revenue"]),
        );
        assert_eq!(result.summary.get("spend"), Some(&120.0));
        assert_eq!(result.summary.get("revenue"), Some(&310.0));
        assert_eq!(result.summary.get("profit"), Some(&180.0));
    }

    #[test]
    fn summary_never_sums_grouping_dimensions() {
        let rows = vec![
            row(&[
                ("offer_id", Value::from(5i64)),
                ("revenue", Value::from(10.0)),
                ("spend", Value::from(0.0)),
            ]),
            row(&[
                ("offer_id", Value::from(7i64)),
                ("revenue", Value::from(20.0)),
                ("spend", Value::from(0.0)),
            ]),
        ];
        let result = finish(
            rows,
            None,
            &dims(&["offer_id"]),
            &dims(&["offer_id", "revenue"]),
        );
        assert!(!result.summary.contains_key("offer_id"));
        assert_eq!(result.summary.get("revenue"), Some(&30.0));
    }

    #[test]
    fn summary_values_are_rounded_to_two_decimals() {
        let rows = vec![
            row(&[("spend", Value::from(0.1))]),
            row(&[("spend", Value::from(0.2))]),
        ];
        let result = finish(rows, None, &dims(&["day"]), &dims(&["revenue"]));
        assert_eq!(result.summary.get("spend"), Some(&0.3));
    }
}
