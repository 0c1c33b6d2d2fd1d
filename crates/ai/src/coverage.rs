//! Days-of-cover advisor.
//!
//! A lighter rule set than the forecasting engine: it only looks at how many days the
//! current stock lasts at the window's average sales rate.

use serde::{Deserialize, Serialize};

use stockflow_core::ProductId;

use crate::recommend::Recommendation;
use crate::series::ForecastWindow;

const REORDER_BELOW_DAYS: f64 = 7.0;
const SLOW_MOVER_ABOVE_DAYS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageInput {
    pub product_id: ProductId,
    pub sold: i64,
    pub stock: i64,
    pub expiring_soon: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAdvice {
    pub product_id: ProductId,
    pub sold_quantity: i64,
    pub current_stock: i64,
    pub avg_daily_sales: Option<f64>,
    pub days_to_empty: Option<f64>,
    pub expiring_soon: i64,
    pub recommendation: Recommendation,
    pub explanation: String,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoverageAdvisor {
    window: ForecastWindow,
    expiry_window_days: u32,
}

impl CoverageAdvisor {
    pub fn new(window: ForecastWindow, expiry_window_days: u32) -> Self {
        Self {
            window,
            expiry_window_days,
        }
    }

    pub fn advise(&self, input: &CoverageInput) -> CoverageAdvice {
        let days = self.window.total_days() as f64;
        let avg_daily = (input.sold > 0).then(|| input.sold as f64 / days);
        let days_to_empty = avg_daily
            .filter(|avg| *avg > 0.0 && input.stock > 0)
            .map(|avg| input.stock as f64 / avg);

        let (mut recommendation, mut explanation) = if input.stock == 0 && input.sold > 0 {
            (
                Recommendation::Buy,
                "Out of stock with sales in the period; reorder.".to_string(),
            )
        } else if input.sold == 0 && input.stock > 0 {
            (
                Recommendation::Avoid,
                "No sales in the period but stock on hand; do not reorder.".to_string(),
            )
        } else if let Some(d) = days_to_empty.filter(|d| *d < REORDER_BELOW_DAYS) {
            (
                Recommendation::Buy,
                format!("Stock runs out in about {d:.1} days; plan a reorder."),
            )
        } else if let Some(d) = days_to_empty.filter(|d| *d > SLOW_MOVER_ABOVE_DAYS) {
            (
                Recommendation::Avoid,
                format!("Stock turns slowly (~{d:.1} days of cover); sell down before reordering."),
            )
        } else {
            (
                Recommendation::Hold,
                "Stock and sales look balanced; keep the current ordering policy.".to_string(),
            )
        };

        if input.expiring_soon > 0 {
            match avg_daily {
                None => {
                    recommendation = Recommendation::Promote;
                    explanation = format!(
                        "{} units expire soon and sales are slow; discount, promote or transfer.",
                        input.expiring_soon
                    );
                }
                Some(avg) if input.expiring_soon as f64 / avg > f64::from(self.expiry_window_days) => {
                    recommendation = Recommendation::Promote;
                    explanation =
                        "Expiring stock will not sell through at the current rate; promote or transfer."
                            .to_string();
                }
                Some(_) => {}
            }
        }

        CoverageAdvice {
            product_id: input.product_id,
            sold_quantity: input.sold,
            current_stock: input.stock,
            avg_daily_sales: avg_daily,
            days_to_empty,
            expiring_soon: input.expiring_soon,
            recommendation,
            explanation,
        }
    }

    /// Advice for every product with sales, stock or expiring stock, ordered by
    /// recommendation name and then by sold quantity, highest first.
    pub fn advise_all<'a>(&self, inputs: impl IntoIterator<Item = &'a CoverageInput>) -> Vec<CoverageAdvice> {
        let mut out: Vec<CoverageAdvice> = inputs
            .into_iter()
            .filter(|i| i.sold > 0 || i.stock > 0 || i.expiring_soon > 0)
            .map(|i| self.advise(i))
            .collect();
        out.sort_by(|a, b| {
            a.recommendation
                .as_str()
                .cmp(b.recommendation.as_str())
                .then(b.sold_quantity.cmp(&a.sold_quantity))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn advisor() -> CoverageAdvisor {
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        CoverageAdvisor::new(ForecastWindow::new(from, to).unwrap(), 30)
    }

    fn input(sold: i64, stock: i64, expiring_soon: i64) -> CoverageInput {
        CoverageInput {
            product_id: ProductId::new(),
            sold,
            stock,
            expiring_soon,
        }
    }

    #[test]
    fn days_to_empty_bands() {
        // 10 sold over 10 days = 1/day.
        let short = advisor().advise(&input(10, 5, 0));
        assert_eq!(short.recommendation, Recommendation::Buy);
        assert_eq!(short.days_to_empty, Some(5.0));

        assert_eq!(advisor().advise(&input(10, 30, 0)).recommendation, Recommendation::Hold);
        assert_eq!(advisor().advise(&input(10, 61, 0)).recommendation, Recommendation::Avoid);
    }

    #[test]
    fn stock_out_and_no_sales_cases() {
        let out = advisor().advise(&input(4, 0, 0));
        assert_eq!(out.recommendation, Recommendation::Buy);
        assert_eq!(out.days_to_empty, None);

        let idle = advisor().advise(&input(0, 8, 0));
        assert_eq!(idle.recommendation, Recommendation::Avoid);
        assert_eq!(idle.avg_daily_sales, None);
    }

    #[test]
    fn expiring_stock_is_promoted_when_it_cannot_sell_through() {
        assert_eq!(advisor().advise(&input(0, 8, 8)).recommendation, Recommendation::Promote);
        // 1/day sells 30 within the 30-day expiry window, but not 31.
        assert_eq!(advisor().advise(&input(10, 30, 30)).recommendation, Recommendation::Hold);
        assert_eq!(advisor().advise(&input(10, 31, 31)).recommendation, Recommendation::Promote);
    }

    #[test]
    fn advise_all_filters_idle_products_and_sorts() {
        let inputs = vec![
            input(0, 0, 0),
            input(3, 0, 0),
            input(9, 0, 0),
            input(0, 5, 0),
        ];
        let advice = advisor().advise_all(&inputs);
        let order: Vec<(Recommendation, i64)> =
            advice.iter().map(|a| (a.recommendation, a.sold_quantity)).collect();
        assert_eq!(
            order,
            vec![
                (Recommendation::Avoid, 0),
                (Recommendation::Buy, 9),
                (Recommendation::Buy, 3),
            ]
        );
    }
}
