//! Purchasing domain module: goods receipts that become inventory batches.

pub mod receipt;

pub use receipt::{PurchaseLine, PurchaseReceipt, ReceivePurchase, ReceivePurchaseOrder};
