//! Sales domain module.
//!
//! Sale requests, their validation, the committed sale record with its totals,
//! and the `SaleRecorded` event. Stock consumption itself happens in the
//! inventory ledger; this crate only describes what was sold and for how much.

pub mod sale;

pub use sale::{RecordSale, Sale, SaleLine, SaleLineRequest, SaleRecorded};
