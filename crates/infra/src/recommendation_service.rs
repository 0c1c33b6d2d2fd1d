//! Read-only reporting over the ledger and the sales history.
//!
//! Both reports work on copies: a [`StockSnapshot`] of the batches and a daily
//! series per product read from the projection. Nothing here takes a stock-key
//! lock for longer than one copy, so reports run alongside sales and purchases.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockflow_ai::{
    AiScheduler, BranchScope, CoverageAdvice, CoverageAdvisor, CoverageInput, DemandSnapshot, ForecastWindow,
    LocalAiScheduler, ProductSnapshot, Recommendation, RecommendationJob, RecommendationReport,
};

use crate::catalog::Catalog;
use crate::config::RecommendationConfig;
use crate::error::InventoryError;
use crate::ledger::{BatchLedger, StockSnapshot};
use crate::projections::SalesHistoryProjection;

/// Parameters of one report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub scope: BranchScope,
    /// Non-positive values fall back to the configured default.
    pub horizon_days: i64,
    /// Reference date for the expiring-soon cutoff.
    pub as_of: NaiveDate,
}

impl RecommendationQuery {
    pub fn new(from: NaiveDate, to: NaiveDate, scope: BranchScope) -> Self {
        Self {
            from,
            to,
            scope,
            horizon_days: 0,
            as_of: to,
        }
    }

    pub fn with_horizon_days(mut self, days: i64) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = date;
        self
    }
}

pub struct RecommendationService<C: Catalog> {
    catalog: C,
    ledger: Arc<BatchLedger>,
    history: Arc<SalesHistoryProjection>,
    config: RecommendationConfig,
}

impl<C: Catalog> RecommendationService<C> {
    pub fn new(
        catalog: C,
        ledger: Arc<BatchLedger>,
        history: Arc<SalesHistoryProjection>,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            history,
            config,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    fn expiry_cutoff(&self, as_of: NaiveDate) -> Result<NaiveDate, InventoryError> {
        as_of
            .checked_add_days(Days::new(u64::from(self.config.expiry_window_days)))
            .ok_or_else(|| InventoryError::Validation(format!("expiry cutoff out of range for {as_of}")))
    }

    fn ensure_scope(&self, scope: BranchScope) -> Result<(), InventoryError> {
        match scope {
            BranchScope::Branch(id) if !self.catalog.has_branch(id)? => Err(InventoryError::not_found("Branch", id)),
            _ => Ok(()),
        }
    }

    fn demand_snapshot(
        &self,
        window: ForecastWindow,
        scope: BranchScope,
        expiry_cutoff: NaiveDate,
        stock: &StockSnapshot,
    ) -> Result<DemandSnapshot, InventoryError> {
        let branch_id = scope.branch_id();
        let mut products = Vec::new();
        for product in self.catalog.products()? {
            let branch_stock = match scope {
                BranchScope::AllBranches => stock.by_branch(product.id),
                BranchScope::Branch(_) => Default::default(),
            };
            products.push(ProductSnapshot {
                product_id: product.id,
                series: self.history.daily_series(product.id, branch_id, &window)?,
                current_stock: stock.available(product.id, branch_id),
                expiring_soon: stock.expiring(product.id, branch_id, expiry_cutoff),
                branch_stock,
                name: product.name,
                sku: product.sku,
            });
        }
        Ok(DemandSnapshot {
            window,
            scope,
            expiry_cutoff,
            products,
        })
    }

    /// Forecast every catalog product over `[from, to]` and recommend an action.
    pub fn generate(&self, query: RecommendationQuery) -> Result<RecommendationReport, InventoryError> {
        let window = ForecastWindow::new(query.from, query.to)?;
        self.ensure_scope(query.scope)?;
        let horizon_days = self.config.effective_horizon(query.horizon_days);
        let cutoff = self.expiry_cutoff(query.as_of)?;

        let stock = self.ledger.snapshot()?;
        let snapshot = self.demand_snapshot(window, query.scope, cutoff, &stock)?;
        let job = RecommendationJob::new(snapshot, horizon_days);
        let report = LocalAiScheduler::new(query.scope).run(job)?;

        info!(
            from = %report.from,
            to = %report.to,
            scope = ?report.scope,
            horizon_days,
            products = report.items.len(),
            buy = report.count_of(Recommendation::Buy),
            promote = report.count_of(Recommendation::Promote) + report.count_of(Recommendation::TransferOrPromote),
            test_points = report.test_points,
            rmse = ?report.rmse,
            mape = ?report.mape,
            "recommendation report generated"
        );
        Ok(report)
    }

    /// Days-of-cover advice for products with sales, stock or expiring stock.
    pub fn coverage(&self, query: RecommendationQuery) -> Result<Vec<CoverageAdvice>, InventoryError> {
        let window = ForecastWindow::new(query.from, query.to)?;
        self.ensure_scope(query.scope)?;
        let cutoff = self.expiry_cutoff(query.as_of)?;
        let branch_id = query.scope.branch_id();

        let stock = self.ledger.snapshot()?;
        let mut inputs = Vec::new();
        for product in self.catalog.products()? {
            inputs.push(CoverageInput {
                product_id: product.id,
                sold: self.history.sold_quantity(product.id, branch_id, &window)?,
                stock: stock.available(product.id, branch_id),
                expiring_soon: stock.expiring(product.id, branch_id, cutoff),
            });
        }

        let advice = CoverageAdvisor::new(window, self.config.expiry_window_days).advise_all(&inputs);
        info!(products = advice.len(), scope = ?query.scope, "coverage advice generated");
        Ok(advice)
    }
}
