use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BatchId, BranchId, DomainError, DomainResult, Money, ProductId};

/// Command: ReceivePurchase. One delivered line becomes one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePurchase {
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub unit_cost: Money,
    pub expiry_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

impl ReceivePurchase {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::invalid_line_quantity(self.product_id, self.quantity));
        }
        Ok(())
    }
}

/// Purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Money,
    pub expiry_date: Option<NaiveDate>,
}

/// Command: ReceivePurchaseOrder. Several lines delivered to one branch, received
/// together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePurchaseOrder {
    pub branch_id: BranchId,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

impl ReceivePurchaseOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("purchase order must have at least one line"));
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_line_quantity(line.product_id, line.quantity));
            }
        }
        Ok(())
    }

    /// Split into single-line receipts sharing the order's branch and time.
    pub fn receipts(&self) -> Vec<ReceivePurchase> {
        self.lines
            .iter()
            .map(|line| ReceivePurchase {
                product_id: line.product_id,
                branch_id: self.branch_id,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                expiry_date: line.expiry_date,
                occurred_at: self.occurred_at,
            })
            .collect()
    }
}

/// Result of receiving one purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub unit_cost: Money,
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
}

impl PurchaseReceipt {
    /// Landed cost of the batch, `None` on overflow.
    pub fn total_cost(&self) -> Option<Money> {
        self.unit_cost.checked_times(self.quantity)
    }
}
