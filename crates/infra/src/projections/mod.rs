//! Read models rebuilt from published events.
//!
//! Projections are disposable: everything they hold can be recomputed from the
//! sale store. Consumers must tolerate redelivery.

pub mod sales_history;

pub use sales_history::{ProjectionError, SalesHistoryProjection};
