//! Calendar and lag/rolling feature construction for a value series.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::SeriesPoint;

/// Width of the trailing rolling-mean window.
pub const ROLLING_WINDOW: usize = 6;

/// Features derived for one series row. Lag and rolling fields are `None`
/// until enough history exists; the training path drops such rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub ts: DateTime<Utc>,
    pub hour: f64,
    pub dow: f64,
    pub lag_1: Option<f64>,
    pub lag_2: Option<f64>,
    pub roll_6: Option<f64>,
}

impl FeatureRow {
    /// The five temporal/lag features, or `None` while any is undefined.
    pub fn temporal(&self) -> Option<[f64; 5]> {
        Some([self.hour, self.dow, self.lag_1?, self.lag_2?, self.roll_6?])
    }
}

/// Pure transform: one feature row per input row, in input order. Never
/// extrapolates beyond the given series.
pub fn make_features(series: &[SeriesPoint]) -> Vec<FeatureRow> {
    series
        .iter()
        .enumerate()
        .map(|(i, point)| FeatureRow {
            ts: point.ts,
            hour: hour_of_day(point.ts),
            dow: day_of_week(point.ts),
            lag_1: i.checked_sub(1).map(|j| series[j].value),
            lag_2: i.checked_sub(2).map(|j| series[j].value),
            roll_6: (i + 1 >= ROLLING_WINDOW)
                .then(|| mean(&series[i + 1 - ROLLING_WINDOW..=i])),
        })
        .collect()
}

pub fn hour_of_day(ts: DateTime<Utc>) -> f64 {
    ts.hour() as f64
}

/// Day of week with Monday = 0, matching the training data convention.
pub fn day_of_week(ts: DateTime<Utc>) -> f64 {
    ts.weekday().num_days_from_monday() as f64
}

fn mean(window: &[SeriesPoint]) -> f64 {
    window.iter().map(|p| p.value).sum::<f64>() / window.len() as f64
}
