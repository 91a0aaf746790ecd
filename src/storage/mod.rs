mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{CommissionRate, Id, SpendEntry};

/// Filter for ledger range queries. Bounds are inclusive and open-ended on
/// either side when unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub offer_id: Option<i64>,
    pub identity: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &SpendEntry) -> bool {
        if let Some(from) = self.date_from {
            if entry.date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.date > to {
                return false;
            }
        }
        if let Some(offer_id) = self.offer_id {
            if entry.offer_id != offer_id {
                return false;
            }
        }
        if let Some(identity) = &self.identity {
            if entry.identity != *identity {
                return false;
            }
        }
        true
    }
}

/// Storage trait for commission rates and spend entries.
///
/// Writes must be durable before the call returns. Backends are expected to
/// keep `find_entry` consistent with prior `save_entry` calls from the same
/// process; the upsert in the ledger service relies on that.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Commission rates
    async fn list_rates(&self) -> Result<Vec<CommissionRate>>;
    async fn get_rate(&self, id: &Id) -> Result<Option<CommissionRate>>;
    async fn find_rate_by_agency(&self, agency: &str) -> Result<Option<CommissionRate>>;
    async fn save_rate(&self, rate: &CommissionRate) -> Result<()>;
    /// Returns false when no rate with that id existed.
    async fn delete_rate(&self, id: &Id) -> Result<bool>;

    // Spend entries
    async fn find_entry(
        &self,
        offer_id: i64,
        date: NaiveDate,
        identity: &str,
    ) -> Result<Option<SpendEntry>>;
    async fn save_entry(&self, entry: &SpendEntry) -> Result<()>;
    async fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<SpendEntry>>;
}
