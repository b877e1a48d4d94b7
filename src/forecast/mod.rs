//! Forecast request path: weather-bounded history read, alignment, feature
//! construction, and the recursive rollout.

pub mod align;
pub mod engine;
pub mod features;
pub mod model;

pub use align::align;
pub use engine::{CovariateProvider, Covariates, HoldLastWeather, RecursiveForecaster};
pub use features::{make_features, FeatureRow, ROLLING_WINDOW};
pub use model::LoadModel;

use chrono::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ForecastConfig;
use crate::domain::{ForecastPoint, Metric, Resolution};
use crate::store::{TimeSeriesStore, WeatherStore};

/// Failure taxonomy for a forecast request. The data-shortfall variants are
/// user-facing and name the observed vs required counts so "not enough
/// history yet" is self-diagnosable.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("no weather data available yet")]
    NoWeatherData,

    #[error("not enough {what} (have {have}, need >= {need})")]
    InsufficientHistory {
        what: &'static str,
        have: usize,
        need: usize,
    },

    #[error("invalid horizon {got}: expected {min}..={max}")]
    InvalidHorizon { got: i64, min: u32, max: u32 },

    #[error("store failure: {0}")]
    Store(anyhow::Error),

    #[error("model failure: {0}")]
    Model(anyhow::Error),
}

/// Forecast hourly load for a region. Weather coverage bounds the usable
/// training window because it is the scarcer series; an empty weather store
/// fails fast instead of attempting an empty join.
pub async fn forecast_load(
    series: &TimeSeriesStore,
    weather: &WeatherStore,
    cfg: &ForecastConfig,
    region: &str,
    horizon: u32,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    if horizon < 1 || horizon > cfg.max_horizon {
        return Err(ForecastError::InvalidHorizon {
            got: horizon as i64,
            min: 1,
            max: cfg.max_horizon,
        });
    }

    let (w_min, w_max) = weather
        .coverage()
        .await
        .map_err(ForecastError::Store)?
        .ok_or(ForecastError::NoWeatherData)?;

    let load = series
        .find_range(region, Metric::Load, Resolution::Hour, w_min, w_max)
        .await
        .map_err(ForecastError::Store)?;
    if load.len() < cfg.min_training_rows {
        return Err(ForecastError::InsufficientHistory {
            what: "hourly load rows in the weather window",
            have: load.len(),
            need: cfg.min_training_rows,
        });
    }

    let observations = weather
        .find_range(w_min, w_max)
        .await
        .map_err(ForecastError::Store)?;
    if observations.len() < cfg.min_training_rows {
        return Err(ForecastError::InsufficientHistory {
            what: "hourly weather rows in the weather window",
            have: observations.len(),
            need: cfg.min_training_rows,
        });
    }

    let joined = align(
        &load,
        &observations,
        Duration::minutes(cfg.join_tolerance_minutes),
    );
    debug!(
        region,
        load = load.len(),
        weather = observations.len(),
        joined = joined.len(),
        window = %format!("[{w_min}..{w_max}]"),
        "aligned forecast inputs"
    );
    if joined.len() < cfg.min_training_rows {
        return Err(ForecastError::InsufficientHistory {
            what: "aligned load+weather rows",
            have: joined.len(),
            need: cfg.min_training_rows,
        });
    }

    RecursiveForecaster::new(cfg.min_training_rows, cfg.max_horizon).forecast(&joined, horizon)
}
