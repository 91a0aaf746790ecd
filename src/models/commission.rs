use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// Reference record mapping an agency to its commission percent.
///
/// `agency` is unique across the table. The percent is read at spend
/// submission time and frozen into the entry; editing a rate never touches
/// entries already written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRate {
    pub id: Id,
    pub agency: String,
    /// Percent in [0, 100].
    pub percent: Decimal,
}

impl CommissionRate {
    pub fn new(agency: impl Into<String>, percent: Decimal) -> Self {
        Self {
            id: Id::new(),
            agency: agency.into(),
            percent,
        }
    }
}
