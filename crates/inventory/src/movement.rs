use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BranchId, MovementId, ProductId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    In,
    Out,
}

/// Append-only audit record: one per ledger mutation, quantity always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// Quantity with sign: positive for IN, negative for OUT.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            MovementKind::In => self.quantity,
            MovementKind::Out => -self.quantity,
        }
    }
}
