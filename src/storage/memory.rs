//! In-memory storage implementation for testing.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::models::{tuple_key, CommissionRate, Id, SpendEntry};

use super::{EntryFilter, Storage};

/// In-memory storage for testing purposes.
///
/// Spend entries are keyed by their (offer, date, identity) tuple, so a save
/// for an existing tuple replaces the record, matching the upsert invariant
/// the file backend gets from deterministic ids.
#[derive(Default)]
pub struct MemoryStorage {
    rates: Mutex<HashMap<Id, CommissionRate>>,
    entries: Mutex<HashMap<String, SpendEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_rates(&self) -> Result<Vec<CommissionRate>> {
        let rates = self.rates.lock().await;
        let mut out: Vec<_> = rates.values().cloned().collect();
        out.sort_by(|a, b| a.agency.cmp(&b.agency));
        Ok(out)
    }

    async fn get_rate(&self, id: &Id) -> Result<Option<CommissionRate>> {
        let rates = self.rates.lock().await;
        Ok(rates.get(id).cloned())
    }

    async fn find_rate_by_agency(&self, agency: &str) -> Result<Option<CommissionRate>> {
        let rates = self.rates.lock().await;
        Ok(rates.values().find(|r| r.agency == agency).cloned())
    }

    async fn save_rate(&self, rate: &CommissionRate) -> Result<()> {
        let mut rates = self.rates.lock().await;
        rates.insert(rate.id.clone(), rate.clone());
        Ok(())
    }

    async fn delete_rate(&self, id: &Id) -> Result<bool> {
        let mut rates = self.rates.lock().await;
        Ok(rates.remove(id).is_some())
    }

    async fn find_entry(
        &self,
        offer_id: i64,
        date: NaiveDate,
        identity: &str,
    ) -> Result<Option<SpendEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&tuple_key(offer_id, date, identity)).cloned())
    }

    async fn save_entry(&self, entry: &SpendEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(entry.tuple_key(), entry.clone());
        Ok(())
    }

    async fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<SpendEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}
