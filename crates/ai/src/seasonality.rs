//! Calendar seasonality.
//!
//! Four sub-factors, each `group average / baseline` clamped to its own band, blended
//! with fixed weights. Groups are formed from the days present in the series.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::series::DailySeries;

/// Minimum number of distinct sale days before seasonality is attempted.
pub const MIN_POINTS: usize = 14;

/// Fixed holiday calendar as (month, day).
pub const HOLIDAYS: [(u32, u32); 5] = [(1, 1), (4, 23), (5, 19), (8, 30), (10, 29)];

const DOW_WEIGHT: f64 = 0.45;
const MONTH_WEIGHT: f64 = 0.25;
const SEASON_WEIGHT: f64 = 0.20;
const HOLIDAY_WEIGHT: f64 = 0.10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn of(date: NaiveDate) -> Self {
        match date.month() {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }
}

pub fn is_holiday(date: NaiveDate) -> bool {
    HOLIDAYS.contains(&(date.month(), date.day()))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The four clamped sub-factors behind a seasonal factor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBreakdown {
    pub day_of_week: f64,
    pub month: f64,
    pub season: f64,
    pub holiday: f64,
}

impl SeasonalBreakdown {
    pub fn blended(&self) -> f64 {
        DOW_WEIGHT * self.day_of_week
            + MONTH_WEIGHT * self.month
            + SEASON_WEIGHT * self.season
            + HOLIDAY_WEIGHT * self.holiday
    }
}

/// Seasonal multiplier for a forecast ending at `to`.
///
/// `None` when the series is shorter than [`MIN_POINTS`] or the baseline is not positive.
pub fn seasonal_factor(series: &DailySeries, baseline: f64, to: NaiveDate) -> Option<f64> {
    seasonal_breakdown(series, baseline, to).map(|b| b.blended())
}

pub fn seasonal_breakdown(
    series: &DailySeries,
    baseline: f64,
    to: NaiveDate,
) -> Option<SeasonalBreakdown> {
    if series.len() < MIN_POINTS || baseline.is_nan() || baseline <= 0.0 {
        return None;
    }

    let weekday = average(series, |d| !is_weekend(d));
    let weekend = average(series, is_weekend);
    let dow_avg = match (weekday, weekend) {
        (Some(wd), Some(we)) => Some((wd + we) / 2.0),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    };

    let target_season = Season::of(to);

    Some(SeasonalBreakdown {
        day_of_week: clamped_ratio(dow_avg, baseline, 0.7, 1.3),
        month: clamped_ratio(average(series, |d| d.month() == to.month()), baseline, 0.7, 1.3),
        season: clamped_ratio(
            average(series, |d| Season::of(d) == target_season),
            baseline,
            0.8,
            1.2,
        ),
        holiday: clamped_ratio(average(series, is_holiday), baseline, 0.85, 1.15),
    })
}

fn average(series: &DailySeries, include: impl Fn(NaiveDate) -> bool) -> Option<f64> {
    let (sum, count) = series
        .iter()
        .filter(|(d, _)| include(*d))
        .fold((0i64, 0usize), |(s, c), (_, q)| (s + q, c + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Empty groups and non-finite ratios count as neutral.
fn clamped_ratio(group_avg: Option<f64>, baseline: f64, lo: f64, hi: f64) -> f64 {
    match group_avg {
        Some(avg) => {
            let ratio = avg / baseline;
            if ratio.is_finite() { ratio.clamp(lo, hi) } else { 1.0 }
        }
        None => 1.0,
    }
}
