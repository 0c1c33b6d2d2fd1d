//! Inventory domain module (batch level, event-sourced).
//!
//! Business rules for batches and FIFO consumption, implemented purely as
//! deterministic domain logic with no IO or locking. Concurrency and
//! id allocation live in `stockflow-infra`.

pub mod batch;
pub mod ledger;
pub mod movement;

pub use batch::{Batch, StockKey};
pub use ledger::{
    BatchDraw, BatchReceived, ConsumeStock, LedgerCommand, LedgerEvent, ReceiveBatch,
    StockConsumed, StockLedger,
};
pub use movement::{MovementKind, StockMovement};
