use crate::models::Id;

/// Error taxonomy for the core operations.
///
/// Every variant is terminal for the current request; nothing is retried
/// internally. A failed tracker fetch fails the whole report rather than
/// degrading to ledger-only data, since a partial summary would be wrong.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("tracker unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("agency {0:?} not found")]
    AgencyNotFound(String),

    #[error("agency {0:?} already has a commission rate")]
    DuplicateAgency(String),

    #[error("caller has no identity tag provisioned")]
    IdentityNotProvisioned,

    #[error("commission rate {0} not found")]
    RateNotFound(Id),

    #[error("{0} requires an administrative caller")]
    Forbidden(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
