use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::Id;

/// One ledger record: spend contributed for an (offer, date, identity) tuple.
///
/// At most one entry exists per tuple; resubmitting the same tuple overwrites
/// the existing entry rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendEntry {
    pub offer_id: i64,
    pub date: NaiveDate,
    /// Opaque tracking tag the spend is attributed to.
    pub identity: String,
    /// Account that owns the entry, when known. Admin-submitted entries for
    /// another identity leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Id>,
    /// Amount as entered, before commission.
    pub raw_amount: Decimal,
    /// Commission percent applied at write time, retained for audit. Later
    /// rate changes never recompute stored entries.
    pub commission_percent: Decimal,
    /// Canonical ledger value: `raw_amount` inflated by the commission
    /// percent, rounded to 2 decimal places.
    pub spend: Decimal,
}

impl SpendEntry {
    pub fn new(
        offer_id: i64,
        date: NaiveDate,
        identity: impl Into<String>,
        owner: Option<Id>,
        raw_amount: Decimal,
        commission_percent: Decimal,
    ) -> Self {
        Self {
            offer_id,
            date,
            identity: identity.into(),
            owner,
            raw_amount,
            commission_percent,
            spend: adjusted_spend(raw_amount, commission_percent),
        }
    }

    /// The unique tuple identifying this entry in the ledger.
    pub fn tuple_key(&self) -> String {
        tuple_key(self.offer_id, self.date, &self.identity)
    }

    /// Deterministic storage id derived from the tuple, so repeated writes
    /// for the same tuple land on the same record.
    pub fn storage_id(&self) -> Id {
        Id::from_external(&self.tuple_key())
    }
}

pub fn tuple_key(offer_id: i64, date: NaiveDate, identity: &str) -> String {
    format!("{offer_id}|{date}|{identity}")
}

/// Commission-adjusted spend: `raw × (1 + percent/100)`, rounded half away
/// from zero to 2 decimal places.
pub fn adjusted_spend(raw_amount: Decimal, commission_percent: Decimal) -> Decimal {
    (raw_amount * (Decimal::ONE + commission_percent / Decimal::ONE_HUNDRED))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
