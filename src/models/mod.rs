mod commission;
pub mod fields;
mod id;
mod identity;
mod row;
mod spend_entry;

pub use commission::CommissionRate;
pub use id::{Id, IdError};
pub use identity::IdentityContext;
pub use row::{round2, ReportResult, Row, Value};
pub use spend_entry::{adjusted_spend, tuple_key, SpendEntry};
