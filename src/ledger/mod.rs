//! The spend ledger: submission, bulk import, and roll-up queries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::{Error, Result};
use crate::models::fields::{DAY, IDENTITY_TAG, OFFER_ID, SPEND};
use crate::models::{round2, IdentityContext, ReportResult, Row, SpendEntry};
use crate::storage::{EntryFilter, Storage};

/// A spend submission, before commission adjustment.
#[derive(Debug, Clone)]
pub struct NewSpend {
    pub offer_id: i64,
    pub date: NaiveDate,
    pub raw_amount: Decimal,
    /// Must resolve to an existing commission rate.
    pub agency: String,
    /// Attribute the entry to another identity. Only honored for
    /// administrative callers; ordinary callers always write to their own tag.
    pub target_identity: Option<String>,
}

/// Ledger-side report query. Date bounds are inclusive and may be open-ended
/// on either side.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub offer_id: Option<i64>,
    pub identity: Option<String>,
    /// Grouping dimensions for roll-up. Empty means raw per-entry rows.
    pub grouping: Vec<String>,
}

/// One record of a bulk import. The spend value is taken as already
/// commission-adjusted and stored verbatim.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub offer_id: i64,
    pub date: NaiveDate,
    pub identity: String,
    pub spend: Decimal,
    pub commission_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub offer_id: i64,
    pub date: NaiveDate,
    pub identity: String,
    pub status: ImportStatus,
}

/// Service over the spend ledger.
#[derive(Clone)]
pub struct LedgerService {
    storage: Arc<dyn Storage>,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Record spend for an (offer, date, identity) tuple.
    ///
    /// The agency's commission percent is applied at write time and frozen
    /// into the entry. Writes upsert on the tuple: resubmitting the same
    /// tuple replaces both `spend` and `commission_percent` rather than
    /// creating a second entry. Concurrent submissions for the same tuple
    /// are last-write-wins.
    pub async fn submit_spend(
        &self,
        ctx: &IdentityContext,
        spend: NewSpend,
    ) -> Result<SpendEntry> {
        if spend.raw_amount < Decimal::ZERO {
            return Err(Error::InvalidAmount(
                "spend amount must be non-negative".to_string(),
            ));
        }

        let rate = self
            .storage
            .find_rate_by_agency(&spend.agency)
            .await?
            .ok_or_else(|| Error::AgencyNotFound(spend.agency.clone()))?;

        let (identity, owner) = match spend.target_identity.filter(|_| ctx.is_admin) {
            Some(target) => (target, None),
            None => {
                let tag = ctx.tag.clone().ok_or(Error::IdentityNotProvisioned)?;
                (tag, ctx.account.clone())
            }
        };

        let entry = SpendEntry::new(
            spend.offer_id,
            spend.date,
            identity,
            owner,
            spend.raw_amount,
            rate.percent,
        );

        let existing = self
            .storage
            .find_entry(entry.offer_id, entry.date, &entry.identity)
            .await?;
        self.storage.save_entry(&entry).await?;
        if existing.is_some() {
            tracing::debug!(key = %entry.tuple_key(), spend = %entry.spend, "Updated spend entry");
        } else {
            tracing::debug!(key = %entry.tuple_key(), spend = %entry.spend, "Created spend entry");
        }

        Ok(entry)
    }

    /// Project ledger entries into report rows, rolled up by the requested
    /// grouping dimensions.
    ///
    /// Each entry contributes `day`, `offer_id` and `spend`, plus the
    /// identity tag when it is one of the grouping dimensions. Entries
    /// sharing a composite key are merged by summing `spend`, with the
    /// descriptive fields seeded from the first entry seen for the key. A
    /// coarser grouping therefore merges identities' and offers' spend into
    /// one bucket: intentional roll-up, so callers wanting a fine-grained
    /// audit must group by the identity or offer dimension.
    pub async fn query_rows(&self, query: &LedgerQuery) -> Result<Vec<Row>> {
        let filter = EntryFilter {
            date_from: query.date_from,
            date_to: query.date_to,
            offer_id: query.offer_id,
            identity: query.identity.clone(),
        };
        let mut entries = self.storage.query_entries(&filter).await?;
        entries.sort_by(|a, b| {
            (a.date, a.offer_id, &a.identity).cmp(&(b.date, b.offer_id, &b.identity))
        });

        let with_identity = query.grouping.iter().any(|dim| dim == IDENTITY_TAG);
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut row = Row::new();
            row.set(DAY, entry.date.to_string());
            row.set(OFFER_ID, entry.offer_id);
            if with_identity {
                row.set(IDENTITY_TAG, entry.identity.clone());
            }
            row.set(SPEND, entry.spend.to_f64().unwrap_or(0.0));
            rows.push(row);
        }

        if query.grouping.is_empty() {
            return Ok(rows);
        }

        // Roll-up, preserving first-seen key order.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Row> = HashMap::new();
        for row in rows {
            let key = row.composite_key(&query.grouping);
            match groups.get_mut(&key) {
                Some(group) => {
                    let total =
                        group.number(SPEND).unwrap_or(0.0) + row.number(SPEND).unwrap_or(0.0);
                    group.set(SPEND, total);
                }
                None => {
                    let mut group = Row::new();
                    for dim in &query.grouping {
                        match row.get(dim) {
                            Some(value) => group.set(dim.clone(), value.clone()),
                            None => group.set(dim.clone(), ""),
                        };
                    }
                    group.set(SPEND, row.number(SPEND).unwrap_or(0.0));
                    order.push(key.clone());
                    groups.insert(key, group);
                }
            }
        }

        Ok(order.into_iter().filter_map(|k| groups.remove(&k)).collect())
    }

    /// Ledger-only report: rolled-up rows plus a spend total.
    pub async fn report(&self, query: &LedgerQuery) -> Result<ReportResult> {
        let rows = self.query_rows(query).await?;
        let spend_total: f64 = rows.iter().filter_map(|r| r.number(SPEND)).sum();
        let mut summary = BTreeMap::new();
        summary.insert(SPEND.to_string(), round2(spend_total));
        Ok(ReportResult { rows, summary })
    }

    /// Bulk upsert of externally prepared entries.
    ///
    /// Invalid records are skipped and reported, not fatal; the rest of the
    /// batch still lands. An overwrite keeps the existing entry's owner.
    pub async fn import(&self, records: Vec<ImportRecord>) -> Result<Vec<ImportOutcome>> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let mut outcome = ImportOutcome {
                offer_id: record.offer_id,
                date: record.date,
                identity: record.identity.clone(),
                status: ImportStatus::Skipped,
            };
            if record.identity.is_empty() || record.spend < Decimal::ZERO {
                tracing::warn!(
                    offer_id = record.offer_id,
                    date = %record.date,
                    "Skipping invalid import record"
                );
                outcomes.push(outcome);
                continue;
            }

            let existing = self
                .storage
                .find_entry(record.offer_id, record.date, &record.identity)
                .await?;
            let entry = SpendEntry {
                offer_id: record.offer_id,
                date: record.date,
                identity: record.identity,
                owner: existing.as_ref().and_then(|e| e.owner.clone()),
                raw_amount: record.spend,
                commission_percent: record.commission_percent,
                spend: record.spend,
            };
            self.storage.save_entry(&entry).await?;

            outcome.status = if existing.is_some() {
                ImportStatus::Updated
            } else {
                ImportStatus::Created
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
