//! Infrastructure layer: the concurrent batch ledger, the sale and purchase
//! transactions built on it, read models and reporting services.
//!
//! Everything is in-process. Shared state sits behind `std::sync` locks and every
//! lock failure surfaces as [`InventoryError::Poisoned`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory_service;
pub mod ledger;
pub mod on_hand_cache;
pub mod projections;
pub mod recommendation_service;
pub mod sales_store;


pub use catalog::{BranchRef, Catalog, InMemoryCatalog, ProductRef};
pub use config::{ConfigError, RecommendationConfig};
pub use error::InventoryError;
pub use inventory_service::InventoryService;
pub use ledger::{BatchLedger, Committed, Consumption, ConsumptionRecord, LedgerTx, Replenishment, StockSnapshot};
pub use on_hand_cache::OnHandCache;
pub use projections::{ProjectionError, SalesHistoryProjection};
pub use recommendation_service::{RecommendationQuery, RecommendationService};
pub use sales_store::InMemorySaleStore;
