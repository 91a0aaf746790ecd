//! Commission rate management.
//!
//! Plain CRUD over the agency commission table. Anyone submitting spend may
//! read it; mutations are admin-only. Editing a rate never recomputes entries
//! already in the ledger, since their percent was frozen at write time.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::errors::{Error, Result};
use crate::models::{CommissionRate, Id, IdentityContext};
use crate::storage::Storage;

#[derive(Clone)]
pub struct CommissionService {
    storage: Arc<dyn Storage>,
}

impl CommissionService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn list(&self) -> Result<Vec<CommissionRate>> {
        Ok(self.storage.list_rates().await?)
    }

    pub async fn create(
        &self,
        ctx: &IdentityContext,
        agency: &str,
        percent: Decimal,
    ) -> Result<CommissionRate> {
        require_admin(ctx)?;
        validate_percent(percent)?;
        if self.storage.find_rate_by_agency(agency).await?.is_some() {
            return Err(Error::DuplicateAgency(agency.to_string()));
        }
        let rate = CommissionRate::new(agency, percent);
        self.storage.save_rate(&rate).await?;
        tracing::debug!(agency, percent = %percent, "Created commission rate");
        Ok(rate)
    }

    pub async fn update(
        &self,
        ctx: &IdentityContext,
        id: &Id,
        agency: &str,
        percent: Decimal,
    ) -> Result<CommissionRate> {
        require_admin(ctx)?;
        validate_percent(percent)?;
        let mut rate = self
            .storage
            .get_rate(id)
            .await?
            .ok_or_else(|| Error::RateNotFound(id.clone()))?;
        if let Some(other) = self.storage.find_rate_by_agency(agency).await? {
            if other.id != *id {
                return Err(Error::DuplicateAgency(agency.to_string()));
            }
        }
        rate.agency = agency.to_string();
        rate.percent = percent;
        self.storage.save_rate(&rate).await?;
        Ok(rate)
    }

    pub async fn delete(&self, ctx: &IdentityContext, id: &Id) -> Result<()> {
        require_admin(ctx)?;
        if !self.storage.delete_rate(id).await? {
            return Err(Error::RateNotFound(id.clone()));
        }
        Ok(())
    }
}

fn require_admin(ctx: &IdentityContext) -> Result<()> {
    if ctx.is_admin {
        Ok(())
    } else {
        Err(Error::Forbidden("commission rate management"))
    }
}

fn validate_percent(percent: Decimal) -> Result<()> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(Error::InvalidAmount(
            "commission percent must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service() -> CommissionService {
        CommissionService::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn mutations_require_admin() {
        let svc = service();
        let user = IdentityContext::user("b1");
        let err = svc.create(&user, "acme", dec("10")).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // Reads are open to any caller.
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn agency_is_unique() {
        let svc = service();
        let admin = IdentityContext::admin();
        svc.create(&admin, "acme", dec("10")).await.unwrap();
        let err = svc.create(&admin, "acme", dec("20")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateAgency(a) if a == "acme"));
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_id() {
        let svc = service();
        let admin = IdentityContext::admin();
        let missing = Id::new();
        let err = svc
            .update(&admin, &missing, "acme", dec("10"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateNotFound(_)));
        let err = svc.delete(&admin, &missing).await.unwrap_err();
        assert!(matches!(err, Error::RateNotFound(_)));
    }

    #[tokio::test]
    async fn update_edits_in_place() {
        let svc = service();
        let admin = IdentityContext::admin();
        let rate = svc.create(&admin, "acme", dec("10")).await.unwrap();
        let updated = svc
            .update(&admin, &rate.id, "acme", dec("17.5"))
            .await
            .unwrap();
        assert_eq!(updated.percent, dec("17.5"));
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn percent_outside_range_is_rejected() {
        let svc = service();
        let admin = IdentityContext::admin();
        let err = svc.create(&admin, "acme", dec("101")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }
}
