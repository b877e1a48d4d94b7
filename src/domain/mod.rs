//! Core domain types shared by the store, ingestion, and forecasting paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Market metric tracked per region. Closed set; the upstream source addresses
/// each one by a numeric filter id configured in `[ingest]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Load,
    Wind,
    Solar,
}

/// Sampling interval of a stored series. String forms match the upstream
/// chunk-index URL scheme (`index_quarterhour.json` etc).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Quarterhour,
    Hour,
    Day,
}

/// One timestamped scalar observation. Timestamps are stored normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeriesPoint {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

/// One hourly weather reading. Each field is independently absent when the
/// source reports no measurement for that hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherObservation {
    pub ts: DateTime<Utc>,
    pub temperature_2m: Option<f64>,
    pub windspeed_10m: Option<f64>,
    pub precipitation: Option<f64>,
}

/// A load row matched to its nearest weather reading. Only produced by the
/// alignment join, so all three weather fields are present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow {
    pub ts: DateTime<Utc>,
    pub value: f64,
    pub temperature_2m: f64,
    pub windspeed_10m: f64,
    pub precipitation: f64,
}

/// One step of a load forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub ts: DateTime<Utc>,
    pub yhat: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_round_trips_through_strings() {
        assert_eq!(Metric::Load.to_string(), "load");
        assert_eq!("wind".parse::<Metric>().unwrap(), Metric::Wind);
        assert!("price".parse::<Metric>().is_err());
    }

    #[test]
    fn resolution_matches_upstream_url_tokens() {
        assert_eq!(Resolution::Quarterhour.to_string(), "quarterhour");
        assert_eq!("day".parse::<Resolution>().unwrap(), Resolution::Day);
    }
}
