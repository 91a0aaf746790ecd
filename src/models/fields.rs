//! Field names shared between tracker rows and ledger rows.
//!
//! The report shape is dynamic: which fields are present depends on the
//! requested grouping dimensions and metrics. These constants pin down the
//! vocabulary both sources agree on so join keys line up without a mapping
//! layer.

/// Day bucket dimension (YYYY-MM-DD).
pub const DAY: &str = "day";

/// Offer identifier dimension.
pub const OFFER_ID: &str = "offer_id";

/// Identity tag dimension. The tracker exposes the tag as its sixth sub id,
/// and ledger rows use the same name so grouped keys match.
pub const IDENTITY_TAG: &str = "sub_id_6";

/// Commission-adjusted spend, attached by the ledger side of the join.
pub const SPEND: &str = "spend";

pub const REVENUE: &str = "revenue";

/// Derived per-row metric: revenue minus spend.
pub const PROFIT: &str = "profit";

/// Metrics requested from the tracker when the caller does not pick their own.
pub const DEFAULT_METRICS: [&str; 5] = [
    "clicks",
    "campaign_unique_clicks",
    "conversions",
    "revenue",
    "uepc_confirmed",
];
