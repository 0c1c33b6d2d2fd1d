//! Demand forecasting: baseline, trend with hold-out backtest, seasonality, velocity blend.

use serde::{Deserialize, Serialize};

use stockflow_core::ProductId;

use crate::seasonality::seasonal_factor;
use crate::series::{DailySeries, ForecastWindow};

/// Share of the series held out for the backtest.
const TEST_SHARE: f64 = 0.2;

/// Sales velocity class, derived from the baseline daily rate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VelocityClass {
    Fast,
    Medium,
    Slow,
}

impl VelocityClass {
    pub fn classify(baseline_daily: f64) -> Self {
        if baseline_daily >= 1.0 {
            VelocityClass::Fast
        } else if baseline_daily >= 0.2 {
            VelocityClass::Medium
        } else {
            VelocityClass::Slow
        }
    }

    /// (baseline weight, trend weight). Fast movers trust the trend more.
    pub fn weights(self) -> (f64, f64) {
        match self {
            VelocityClass::Fast => (0.35, 0.65),
            VelocityClass::Medium => (0.50, 0.50),
            VelocityClass::Slow => (0.80, 0.20),
        }
    }
}

/// Running error sums over backtest points.
///
/// One accumulator per product; merge them to get the batch-wide figures. RMSE and
/// MAPE are always computed from the merged sums, never by averaging per-product values.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestAccumulator {
    sum_sq_err: f64,
    sum_abs_pct_err: f64,
    test_points: usize,
    positive_points: usize,
}

impl BacktestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, predicted: f64, actual: f64) {
        let err = predicted - actual;
        self.sum_sq_err += err * err;
        self.test_points += 1;
        if actual > 0.0 {
            self.sum_abs_pct_err += err.abs() / actual;
            self.positive_points += 1;
        }
    }

    pub fn merge(&mut self, other: &BacktestAccumulator) {
        self.sum_sq_err += other.sum_sq_err;
        self.sum_abs_pct_err += other.sum_abs_pct_err;
        self.test_points += other.test_points;
        self.positive_points += other.positive_points;
    }

    pub fn test_points(&self) -> usize {
        self.test_points
    }

    pub fn performance(&self) -> ModelPerformance {
        ModelPerformance {
            rmse: (self.test_points > 0)
                .then(|| (self.sum_sq_err / self.test_points as f64).sqrt()),
            mape: (self.positive_points > 0)
                .then(|| self.sum_abs_pct_err / self.positive_points as f64),
            test_points: self.test_points,
            positive_points: self.positive_points,
        }
    }
}

/// Backtest error metrics. Absent when there were no points to measure.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub rmse: Option<f64>,
    pub mape: Option<f64>,
    pub test_points: usize,
    pub positive_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: ProductId,
    pub baseline_daily: f64,
    pub trend_daily: Option<f64>,
    pub seasonal_factor: Option<f64>,
    pub final_daily: Option<f64>,
    pub final_demand: Option<f64>,
    pub velocity_class: VelocityClass,
    /// This product's contribution to the batch-wide backtest.
    pub backtest: BacktestAccumulator,
}

impl ForecastResult {
    pub fn performance(&self) -> ModelPerformance {
        self.backtest.performance()
    }

    /// Forecast demand over the horizon if rules can act on it.
    pub fn usable_demand(&self) -> Option<f64> {
        usable_demand(self.final_demand)
    }
}

/// Demand that rules can act on: present and non-zero.
pub fn usable_demand(final_demand: Option<f64>) -> Option<f64> {
    final_demand.filter(|d| *d != 0.0)
}

/// Ordinary least squares of `values[i]` on `i`. Returns (intercept, slope).
fn ols(values: &[f64]) -> (f64, f64) {
    let m = values.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let denom = m * sxx - sx * sx;
    let slope = if denom == 0.0 { 0.0 } else { (m * sxy - sx * sy) / denom };
    let intercept = (sy - slope * sx) / m;
    (intercept, slope)
}

/// Fit the trend on the training prefix and score it on the held-out tail.
///
/// Returns the next-day trend (`a + b·n`, floored at zero) and the backtest sums.
/// With fewer than two training points the whole series is used and nothing is scored.
fn trend_with_backtest(values: &[f64]) -> Option<(f64, BacktestAccumulator)> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let test_size = ((TEST_SHARE * n as f64).round() as usize).max(1);
    let train_size = n.saturating_sub(test_size);
    let mut backtest = BacktestAccumulator::new();

    let (a, b) = if train_size < 2 {
        ols(values)
    } else {
        let (a, b) = ols(&values[..train_size]);
        for (i, actual) in values.iter().enumerate().skip(train_size) {
            let predicted = (a + b * i as f64).max(0.0);
            backtest.record(predicted, *actual);
        }
        (a, b)
    };

    Some(((a + b * n as f64).max(0.0), backtest))
}

/// Per-product demand forecaster over a fixed window and horizon.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DemandForecaster {
    window: ForecastWindow,
    horizon_days: u32,
}

impl DemandForecaster {
    pub fn new(window: ForecastWindow, horizon_days: u32) -> Self {
        Self {
            window,
            horizon_days,
        }
    }

    pub fn window(&self) -> ForecastWindow {
        self.window
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Forecast one product from its daily series for the window.
    pub fn forecast(&self, product_id: ProductId, series: &DailySeries) -> ForecastResult {
        let baseline_daily = if series.is_empty() {
            0.0
        } else {
            series.total() as f64 / self.window.total_days() as f64
        };
        let velocity_class = VelocityClass::classify(baseline_daily);

        let (trend_daily, backtest) = match trend_with_backtest(&series.values()) {
            Some((trend, backtest)) => (Some(trend), backtest),
            None => (None, BacktestAccumulator::new()),
        };

        let seasonal = seasonal_factor(series, baseline_daily, self.window.to);

        let blended = match (baseline_daily > 0.0, trend_daily) {
            (true, Some(trend)) => {
                let (wb, wt) = velocity_class.weights();
                Some(wb * baseline_daily + wt * trend)
            }
            (true, None) => Some(baseline_daily),
            (false, Some(trend)) => Some(trend),
            (false, None) => None,
        };
        let final_daily = match (blended, seasonal) {
            (Some(daily), Some(factor)) if factor > 0.0 => Some(daily * factor),
            (daily, _) => daily,
        };
        let final_demand = final_daily.map(|d| d * f64::from(self.horizon_days));

        ForecastResult {
            product_id,
            baseline_daily,
            trend_daily,
            seasonal_factor: seasonal,
            final_daily,
            final_demand,
            velocity_class,
            backtest,
        }
    }

    /// Forecast a batch of products and the batch-wide model performance.
    pub fn forecast_batch<'a>(
        &self,
        products: impl IntoIterator<Item = (ProductId, &'a DailySeries)>,
    ) -> (Vec<ForecastResult>, ModelPerformance) {
        let mut global = BacktestAccumulator::new();
        let results: Vec<ForecastResult> = products
            .into_iter()
            .map(|(product_id, series)| {
                let result = self.forecast(product_id, series);
                global.merge(&result.backtest);
                result
            })
            .collect();
        (results, global.performance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + chrono::Days::new(offset)
    }

    fn series_of(quantities: &[i64]) -> DailySeries {
        DailySeries::from_points(quantities.iter().enumerate().map(|(i, q)| (day(i as u64), *q)))
    }

    fn forecaster(days: u64, horizon: u32) -> DemandForecaster {
        DemandForecaster::new(ForecastWindow::new(day(0), day(days - 1)).unwrap(), horizon)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn trend_backtests_on_the_last_fifth() {
        let series = series_of(&[2, 2, 2, 2, 2, 2, 2, 3, 3, 3]);
        let result = forecaster(10, 30).forecast(ProductId::new(), &series);

        assert!(close(result.baseline_daily, 2.3));
        assert_eq!(result.velocity_class, VelocityClass::Fast);
        assert!(close(result.trend_daily.unwrap(), 2.666_667));
        assert_eq!(result.seasonal_factor, None);

        let perf = result.performance();
        assert_eq!(perf.test_points, 2);
        assert!(close(perf.rmse.unwrap(), (0.423_611_f64 / 2.0).sqrt()));
        assert!(close(perf.mape.unwrap(), 0.152_778));

        let expected_daily = 0.35 * 2.3 + 0.65 * (2.0 / 3.0 + 2.0);
        assert!(close(result.final_daily.unwrap(), expected_daily));
        assert!(close(result.final_demand.unwrap(), expected_daily * 30.0));
    }

    #[test]
    fn two_points_train_on_everything_without_scoring() {
        let result = forecaster(2, 10).forecast(ProductId::new(), &series_of(&[1, 3]));
        // a = 1, b = 2, next = a + 2b.
        assert!(close(result.trend_daily.unwrap(), 5.0));
        assert_eq!(result.performance().test_points, 0);
        assert_eq!(result.performance().rmse, None);
    }

    #[test]
    fn empty_series_has_no_forecast() {
        let result = forecaster(30, 30).forecast(ProductId::new(), &DailySeries::new());
        assert_eq!(result.baseline_daily, 0.0);
        assert_eq!(result.trend_daily, None);
        assert_eq!(result.final_daily, None);
        assert_eq!(result.final_demand, None);
        assert_eq!(result.velocity_class, VelocityClass::Slow);
        assert_eq!(result.usable_demand(), None);
    }

    #[test]
    fn zero_demand_is_not_usable() {
        assert_eq!(usable_demand(None), None);
        assert_eq!(usable_demand(Some(0.0)), None);
        assert_eq!(usable_demand(Some(2.5)), Some(2.5));
    }

    #[test]
    fn single_sale_uses_baseline_only() {
        let series = DailySeries::from_points([(day(4), 6)]);
        let result = forecaster(30, 30).forecast(ProductId::new(), &series);
        assert!(close(result.baseline_daily, 0.2));
        assert_eq!(result.velocity_class, VelocityClass::Medium);
        assert!(close(result.final_demand.unwrap(), 6.0));
    }

    #[test]
    fn declining_trend_is_floored_at_zero() {
        let result = forecaster(3, 30).forecast(ProductId::new(), &series_of(&[9, 5, 1]));
        assert_eq!(result.trend_daily, Some(0.0));
    }

    #[test]
    fn batch_metrics_come_from_pooled_sums() {
        let noisy = series_of(&[2, 2, 2, 2, 2, 2, 2, 3, 3, 3]);
        let flat = series_of(&[1, 1, 1, 1, 1]);
        let (results, perf) = forecaster(10, 30)
            .forecast_batch([(ProductId::new(), &noisy), (ProductId::new(), &flat)]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].performance().rmse, Some(0.0));
        assert_eq!(perf.test_points, 3);
        assert!(close(perf.rmse.unwrap(), (0.423_611_f64 / 3.0).sqrt()));
        assert!(close(perf.mape.unwrap(), (0.5 / 3.0 + 0.416_667 / 3.0) / 3.0));
    }

    #[test]
    fn zero_actuals_are_excluded_from_mape_only() {
        let mut acc = BacktestAccumulator::new();
        acc.record(1.0, 0.0);
        let perf = acc.performance();
        assert_eq!(perf.test_points, 1);
        assert_eq!(perf.rmse, Some(1.0));
        assert_eq!(perf.mape, None);
    }

    #[test]
    fn velocity_serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&VelocityClass::Medium).unwrap(),
            "\"MEDIUM\""
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: forecasts of non-negative sales are never negative, and the
        /// hold-out size is max(1, round(0.2·n)) whenever two or more points remain to train on.
        #[test]
        fn forecasts_are_non_negative(quantities in prop::collection::vec(0i64..50, 0..40)) {
            let series = series_of(&quantities);
            let result = forecaster(40, 30).forecast(ProductId::new(), &series);

            prop_assert!(result.baseline_daily >= 0.0);
            prop_assert!(result.trend_daily.unwrap_or(0.0) >= 0.0);
            prop_assert!(result.final_demand.unwrap_or(0.0) >= 0.0);

            let n = quantities.len();
            let test_size = ((0.2 * n as f64).round() as usize).max(1);
            let expected = if n >= 2 && n - test_size >= 2 { test_size } else { 0 };
            prop_assert_eq!(result.performance().test_points, expected);
        }
    }
}
