use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use stockflow_ai::{DailySeries, ForecastWindow};
use stockflow_core::{BranchId, ProductId, SaleId};
use stockflow_events::Subscription;
use stockflow_sales::SaleRecorded;

use crate::error::InventoryError;
use crate::sales_store::InMemorySaleStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("sales history lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct HistoryState {
    seen: HashSet<SaleId>,
    daily: BTreeMap<(ProductId, BranchId, NaiveDate), i64>,
}

/// Daily sold quantity per (product, branch, day), fed by `SaleRecorded`.
///
/// Applying the same sale twice is a no-op, so redelivery is safe.
#[derive(Debug, Default)]
pub struct SalesHistoryProjection {
    inner: RwLock<HistoryState>,
}

impl SalesHistoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sale in. Returns `false` if the sale was already applied.
    pub fn apply(&self, event: &SaleRecorded) -> Result<bool, ProjectionError> {
        let mut state = self.inner.write().map_err(|_| ProjectionError::Poisoned)?;
        let sale = &event.sale;
        if !state.seen.insert(sale.id) {
            debug!(sale_id = %sale.id, "sale already projected");
            return Ok(false);
        }

        let day = sale.occurred_at.date_naive();
        for line in &sale.lines {
            let sold = state
                .daily
                .entry((line.product_id, sale.branch_id, day))
                .or_insert(0);
            *sold = sold.saturating_add(line.quantity);
        }
        Ok(true)
    }

    /// Apply everything queued on `subscription`. Returns how many sales were new.
    pub fn drain(&self, subscription: &Subscription<SaleRecorded>) -> Result<usize, ProjectionError> {
        let mut applied = 0;
        for event in subscription.drain() {
            if self.apply(&event)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Replay every sale in `store`. Sales already applied are skipped, so this
    /// recovers sales whose `SaleRecorded` publication was lost. Returns how many
    /// sales were new.
    pub fn rebuild_from(&self, store: &InMemorySaleStore) -> Result<usize, InventoryError> {
        let mut applied = 0;
        for sale in store.all()? {
            if self.apply(&SaleRecorded { sale })? {
                applied += 1;
            }
        }
        debug!(applied, "sales history rebuilt from sale store");
        Ok(applied)
    }

    /// Sold quantity per day inside `window`, summed over branches unless one is given.
    pub fn daily_series(
        &self,
        product_id: ProductId,
        branch_id: Option<BranchId>,
        window: &ForecastWindow,
    ) -> Result<DailySeries, ProjectionError> {
        let state = self.inner.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(DailySeries::from_points(
            state
                .daily
                .range((product_id, BranchId::from_uuid(Uuid::nil()), NaiveDate::MIN)..)
                .take_while(|((p, _, _), _)| *p == product_id)
                .filter(|((_, b, day), _)| branch_id.is_none_or(|id| *b == id) && window.contains(*day))
                .map(|((_, _, day), qty)| (*day, *qty)),
        ))
    }

    pub fn sold_quantity(
        &self,
        product_id: ProductId,
        branch_id: Option<BranchId>,
        window: &ForecastWindow,
    ) -> Result<i64, ProjectionError> {
        Ok(self.daily_series(product_id, branch_id, window)?.total())
    }

    pub fn applied_sales(&self) -> Result<usize, ProjectionError> {
        Ok(self.inner.read().map_err(|_| ProjectionError::Poisoned)?.seen.len())
    }
}
