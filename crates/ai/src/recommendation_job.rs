use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockflow_core::{BranchId, ProductId};

use crate::forecast::{DemandForecaster, ModelPerformance, VelocityClass};
use crate::job::AiJob;
use crate::recommend::{Recommendation, RecommendationEngine, RecommendationInput, StockView};
use crate::result::AiError;
use crate::scheduler::BranchScope;
use crate::series::{DailySeries, ForecastWindow};

/// Everything the job needs to know about one product, captured at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    /// Daily sold quantities inside the window, for the snapshot's scope.
    pub series: DailySeries,
    pub current_stock: i64,
    pub expiring_soon: i64,
    /// Stock per branch. Only filled for all-branch snapshots.
    pub branch_stock: BTreeMap<BranchId, i64>,
}

/// Read-only input for a recommendation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSnapshot {
    pub window: ForecastWindow,
    pub scope: BranchScope,
    /// Batches expiring on or before this date count as expiring soon.
    pub expiry_cutoff: NaiveDate,
    pub products: Vec<ProductSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub branch_id: Option<BranchId>,
    pub current_stock: i64,
    pub baseline_daily: f64,
    pub trend_daily: Option<f64>,
    pub seasonal_factor: Option<f64>,
    pub final_daily: Option<f64>,
    pub final_demand: Option<f64>,
    pub expiring_soon: i64,
    pub velocity_class: VelocityClass,
    pub recommendation: Recommendation,
    pub risk_score: f64,
    pub explanation: String,
    /// This product's own backtest figures.
    pub performance: ModelPerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub scope: BranchScope,
    pub horizon_days: u32,
    pub expiry_cutoff: NaiveDate,
    /// Pooled over every product's backtest points.
    pub rmse: Option<f64>,
    pub mape: Option<f64>,
    pub test_points: usize,
    pub items: Vec<RecommendationItem>,
}

impl RecommendationReport {
    pub fn item(&self, product_id: ProductId) -> Option<&RecommendationItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn count_of(&self, recommendation: Recommendation) -> usize {
        self.items
            .iter()
            .filter(|i| i.recommendation == recommendation)
            .count()
    }
}

/// Forecast every product in the snapshot and run the rule cascade over each.
#[derive(Debug, Clone)]
pub struct RecommendationJob {
    input: DemandSnapshot,
    horizon_days: u32,
    engine: RecommendationEngine,
}

impl RecommendationJob {
    pub fn new(input: DemandSnapshot, horizon_days: u32) -> Self {
        Self {
            input,
            horizon_days,
            engine: RecommendationEngine::default(),
        }
    }

    pub fn with_engine(mut self, engine: RecommendationEngine) -> Self {
        self.engine = engine;
        self
    }

    fn stock_view(&self, product: &ProductSnapshot) -> StockView {
        match self.input.scope {
            BranchScope::Branch(branch_id) => StockView::SingleBranch(branch_id),
            BranchScope::AllBranches => StockView::AllBranches(product.branch_stock.clone()),
        }
    }
}

impl AiJob for RecommendationJob {
    type Input = DemandSnapshot;
    type Output = RecommendationReport;

    fn scope(&self) -> BranchScope {
        self.input.scope
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<RecommendationReport, AiError> {
        if self.horizon_days == 0 {
            return Err(AiError::InvalidInput("horizon_days must be positive".to_string()));
        }

        let forecaster = DemandForecaster::new(self.input.window, self.horizon_days);
        let (forecasts, performance) = forecaster.forecast_batch(
            self.input
                .products
                .iter()
                .map(|p| (p.product_id, &p.series)),
        );

        let items = self
            .input
            .products
            .iter()
            .zip(forecasts)
            .map(|(product, forecast)| {
                let decision = self.engine.decide(&RecommendationInput {
                    current_stock: product.current_stock,
                    expiring_soon: product.expiring_soon,
                    final_demand: forecast.usable_demand(),
                    has_sales_history: !product.series.is_empty(),
                    view: self.stock_view(product),
                });
                let own = forecast.performance();

                RecommendationItem {
                    product_id: product.product_id,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    branch_id: self.input.scope.branch_id(),
                    current_stock: product.current_stock,
                    baseline_daily: forecast.baseline_daily,
                    trend_daily: forecast.trend_daily,
                    seasonal_factor: forecast.seasonal_factor,
                    final_daily: forecast.final_daily,
                    final_demand: forecast.final_demand,
                    expiring_soon: product.expiring_soon,
                    velocity_class: forecast.velocity_class,
                    recommendation: decision.recommendation,
                    risk_score: decision.risk,
                    explanation: decision.explanation,
                    performance: own,
                }
            })
            .collect();

        Ok(RecommendationReport {
            from: self.input.window.from,
            to: self.input.window.to,
            scope: self.input.scope,
            horizon_days: self.horizon_days,
            expiry_cutoff: self.input.expiry_cutoff,
            rmse: performance.rmse,
            mape: performance.mape,
            test_points: performance.test_points,
            items,
        })
    }
}
