use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockflow_core::{BranchId, ProductId};
use stockflow_inventory::Batch;

/// Point-in-time copy of batches.
///
/// Each key is copied under its own lock; keys are not frozen together, which is
/// enough for read-only reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    batches: Vec<Batch>,
}

impl StockSnapshot {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    fn of<'a>(&'a self, product_id: ProductId, branch_id: Option<BranchId>) -> impl Iterator<Item = &'a Batch> + 'a {
        self.batches
            .iter()
            .filter(move |b| b.product_id == product_id && branch_id.is_none_or(|id| b.branch_id == id))
    }

    pub fn available(&self, product_id: ProductId, branch_id: Option<BranchId>) -> i64 {
        self.of(product_id, branch_id).map(|b| b.quantity).sum()
    }

    /// Stock per branch that holds (or held) a batch of the product.
    pub fn by_branch(&self, product_id: ProductId) -> BTreeMap<BranchId, i64> {
        let mut out = BTreeMap::new();
        for batch in self.of(product_id, None) {
            *out.entry(batch.branch_id).or_insert(0) += batch.quantity;
        }
        out
    }

    pub fn expiring(&self, product_id: ProductId, branch_id: Option<BranchId>, cutoff: NaiveDate) -> i64 {
        self.of(product_id, branch_id)
            .filter(|b| b.expires_by(cutoff))
            .map(|b| b.quantity)
            .sum()
    }

    /// Active batches expiring on or before `cutoff`, soonest first.
    pub fn expiring_batches(&self, cutoff: NaiveDate, branch_id: Option<BranchId>) -> Vec<Batch> {
        let mut out: Vec<Batch> = self
            .batches
            .iter()
            .filter(|b| b.expires_by(cutoff) && branch_id.is_none_or(|id| b.branch_id == id))
            .cloned()
            .collect();
        out.sort_by_key(Batch::fifo_key);
        out
    }
}
