use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BatchId, BranchId, Entity, Money, ProductId};

/// The unit of stock serialization: one product at one branch.
///
/// Ordered by (product, branch) so multi-key operations can lock in a global order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub branch_id: BranchId,
}

impl StockKey {
    pub fn new(product_id: ProductId, branch_id: BranchId) -> Self {
        Self {
            product_id,
            branch_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.branch_id)
    }
}

/// A received lot of one product at one branch.
///
/// `quantity` is what remains. Exhausted batches stay in the ledger as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: Money,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.branch_id)
    }

    pub fn is_active(&self) -> bool {
        self.quantity > 0
    }

    /// Active and expiring on or before `cutoff`. Batches without expiry never qualify.
    pub fn expires_by(&self, cutoff: NaiveDate) -> bool {
        self.is_active() && self.expiry_date.is_some_and(|d| d <= cutoff)
    }

    /// FIFO sort key: expiry ascending with no-expiry last, then receipt time, then id.
    pub fn fifo_key(&self) -> (bool, Option<NaiveDate>, DateTime<Utc>, BatchId) {
        (
            self.expiry_date.is_none(),
            self.expiry_date,
            self.created_at,
            self.id,
        )
    }
}

impl Entity for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
