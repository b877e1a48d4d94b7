//! Recursive multi-step rollout: train on joined history, then predict one
//! hour at a time, feeding each prediction back as pseudo-history.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::features::{self, make_features, ROLLING_WINDOW};
use super::model::LoadModel;
use super::ForecastError;
use crate::domain::{ForecastPoint, JoinedRow, SeriesPoint};

/// Weather covariates for one rollout step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariates {
    pub temperature_2m: f64,
    pub windspeed_10m: f64,
    pub precipitation: f64,
}

/// Supplies weather covariates for future timestamps. Swappable so a real
/// forward weather forecast can replace the hold-last approximation.
pub trait CovariateProvider: Send + Sync {
    fn covariates_for(&self, history: &[JoinedRow], ts: DateTime<Utc>) -> Option<Covariates>;
}

/// Carries the most recent reading in the working history forward. A known
/// approximation: no forward weather forecast is consulted.
pub struct HoldLastWeather;

impl CovariateProvider for HoldLastWeather {
    fn covariates_for(&self, history: &[JoinedRow], _ts: DateTime<Utc>) -> Option<Covariates> {
        history.last().map(|row| Covariates {
            temperature_2m: row.temperature_2m,
            windspeed_10m: row.windspeed_10m,
            precipitation: row.precipitation,
        })
    }
}

pub struct RecursiveForecaster {
    min_training_rows: usize,
    max_horizon: u32,
    covariates: Box<dyn CovariateProvider>,
}

impl RecursiveForecaster {
    pub fn new(min_training_rows: usize, max_horizon: u32) -> Self {
        Self::with_covariates(min_training_rows, max_horizon, Box::new(HoldLastWeather))
    }

    pub fn with_covariates(
        min_training_rows: usize,
        max_horizon: u32,
        covariates: Box<dyn CovariateProvider>,
    ) -> Self {
        Self {
            min_training_rows,
            max_horizon,
            covariates,
        }
    }

    /// Produce exactly `horizon` hourly predictions, starting one hour after
    /// the last history timestamp. Prediction error at step k feeds the lag
    /// features of steps k+1.. and compounds with horizon length.
    pub fn forecast(
        &self,
        history: &[JoinedRow],
        horizon: u32,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if horizon == 0 || horizon > self.max_horizon {
            return Err(ForecastError::InvalidHorizon {
                got: horizon as i64,
                min: 1,
                max: self.max_horizon,
            });
        }
        let mut next_ts = match history.last() {
            Some(row) => row.ts,
            None => {
                return Err(ForecastError::InsufficientHistory {
                    what: "joined load+weather rows",
                    have: 0,
                    need: self.min_training_rows,
                })
            }
        };

        let (x, y) = training_set(history);
        if x.len() < self.min_training_rows {
            return Err(ForecastError::InsufficientHistory {
                what: "usable training rows after feature construction",
                have: x.len(),
                need: self.min_training_rows,
            });
        }
        debug!(rows = x.len(), horizon, "fitting forecast model");
        let model = LoadModel::fit(x, y).map_err(ForecastError::Model)?;

        let mut working = history.to_vec();
        let mut out = Vec::with_capacity(horizon as usize);
        for _ in 0..horizon {
            next_ts += Duration::hours(1);
            let covariates = self
                .covariates
                .covariates_for(&working, next_ts)
                .ok_or_else(|| {
                    ForecastError::Model(anyhow::anyhow!("no covariates available for rollout"))
                })?;
            let row = next_feature_row(&working, next_ts, &covariates);
            let yhat = model.predict_one(&row).map_err(ForecastError::Model)?;

            out.push(ForecastPoint { ts: next_ts, yhat });
            working.push(JoinedRow {
                ts: next_ts,
                value: yhat,
                temperature_2m: covariates.temperature_2m,
                windspeed_10m: covariates.windspeed_10m,
                precipitation: covariates.precipitation,
            });
        }
        Ok(out)
    }
}

/// Training matrix from the full history: rows with undefined lag/rolling
/// features are dropped before fitting.
fn training_set(history: &[JoinedRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let series: Vec<SeriesPoint> = history
        .iter()
        .map(|row| SeriesPoint { ts: row.ts, value: row.value })
        .collect();

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row, feature) in history.iter().zip(make_features(&series)) {
        let Some([hour, dow, lag_1, lag_2, roll_6]) = feature.temporal() else {
            continue;
        };
        x.push(vec![
            hour,
            dow,
            lag_1,
            lag_2,
            roll_6,
            row.temperature_2m,
            row.windspeed_10m,
            row.precipitation,
        ]);
        y.push(row.value);
    }
    (x, y)
}

/// Feature row for one rollout step. Lags come from the tail of the working
/// history (which already contains earlier predictions); the rolling mean
/// degrades gracefully below a full window. `working` must be non-empty.
fn next_feature_row(working: &[JoinedRow], next_ts: DateTime<Utc>, cov: &Covariates) -> Vec<f64> {
    let n = working.len();
    let lag_1 = working.last().map(|row| row.value).unwrap_or_default();
    let lag_2 = if n >= 2 { working[n - 2].value } else { lag_1 };
    let tail = &working[n.saturating_sub(ROLLING_WINDOW)..];
    let roll_6 = tail.iter().map(|row| row.value).sum::<f64>() / tail.len().max(1) as f64;

    vec![
        features::hour_of_day(next_ts),
        features::day_of_week(next_ts),
        lag_1,
        lag_2,
        roll_6,
        cov.temperature_2m,
        cov.windspeed_10m,
        cov.precipitation,
    ]
}
