use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::result::AiError;

/// Inclusive date window a forecast is computed over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ForecastWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AiError> {
        if to < from {
            return Err(AiError::InvalidInput(format!(
                "window end {to} is before start {from}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Inclusive day count, at least 1.
    pub fn total_days(&self) -> i64 {
        ((self.to - self.from).num_days() + 1).max(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Per-product daily sold quantities, keyed and iterated by date.
///
/// Only days with sales appear; the series length is the number of distinct days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySeries {
    points: BTreeMap<NaiveDate, i64>,
}

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (date, quantity) pairs, summing duplicates.
    pub fn from_points(points: impl IntoIterator<Item = (NaiveDate, i64)>) -> Self {
        let mut series = Self::new();
        for (date, quantity) in points {
            series.record(date, quantity);
        }
        series
    }

    /// Add `quantity` to the day; totals saturate at the `i64` bounds.
    pub fn record(&mut self, date: NaiveDate, quantity: i64) {
        let total = self.points.entry(date).or_insert(0);
        *total = total.saturating_add(quantity);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total(&self) -> i64 {
        self.points.values().fold(0i64, |acc, q| acc.saturating_add(*q))
    }

    pub fn get(&self, date: NaiveDate) -> Option<i64> {
        self.points.get(&date).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, i64)> + '_ {
        self.points.iter().map(|(d, q)| (*d, *q))
    }

    /// Quantities in date order, as floats for the regression.
    pub fn values(&self) -> Vec<f64> {
        self.points.values().map(|q| *q as f64).collect()
    }

    /// Restrict to an inclusive window.
    pub fn within(&self, window: &ForecastWindow) -> Self {
        Self {
            points: self
                .points
                .range(window.from..=window.to)
                .map(|(d, q)| (*d, *q))
                .collect(),
        }
    }
}
