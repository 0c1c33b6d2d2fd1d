//! `stockflow-ai`
//!
//! **Responsibility:** demand forecasting and stock recommendations.
//!
//! This crate is read-only with respect to the ledger:
//! - It never depends on the inventory aggregate or takes locks.
//! - It works on snapshots (daily sales series, stock figures) supplied by callers.
//! - It emits **recommendations**, not domain events.
//!
//! The pipeline is a fixed, explainable heuristic: baseline average, OLS trend with a
//! hold-out backtest, calendar seasonality and a velocity-weighted blend, followed by
//! an ordered rule cascade.

pub mod coverage;
pub mod forecast;
pub mod job;
pub mod recommend;
pub mod recommendation_job;
pub mod result;
pub mod scheduler;
pub mod seasonality;
pub mod series;

pub use coverage::{CoverageAdvice, CoverageAdvisor, CoverageInput};
pub use forecast::{BacktestAccumulator, DemandForecaster, ForecastResult, ModelPerformance, VelocityClass};
pub use job::AiJob;
pub use recommend::{Decision, Recommendation, RecommendationEngine, RecommendationInput, StockView};
pub use recommendation_job::{
    DemandSnapshot, ProductSnapshot, RecommendationItem, RecommendationJob, RecommendationReport,
};
pub use result::AiError;
pub use scheduler::{AiScheduler, BranchScope, LocalAiScheduler};
pub use seasonality::seasonal_factor;
pub use series::{DailySeries, ForecastWindow};
