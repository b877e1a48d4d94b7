//! Client for the Open-Meteo-style hourly weather source.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::WeatherObservation;

/// Hourly payload: parallel arrays indexed positionally by hour. Measurement
/// arrays may be shorter than `time` or hold nulls; both decode to `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyArrays {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyPayload {
    #[serde(default)]
    pub hourly: Option<HourlyArrays>,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<HourlyPayload>;
}

#[derive(Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url("https://api.open-meteo.com/v1/forecast".to_string(), timeout)
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("energy-forecast-service/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<HourlyPayload> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "hourly",
                    "temperature_2m,windspeed_10m,precipitation".to_string(),
                ),
                ("timezone", timezone.to_string()),
                ("forecast_days", "7".to_string()),
            ])
            .send()
            .await
            .context("weather GET failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("weather API error: HTTP {status}");
        }
        resp.json().await.context("weather JSON parse failed")
    }
}

/// Convert the parallel arrays to UTC-normalized observations. The payload's
/// naive hour stamps are interpreted in `tz` (the timezone the fetch asked
/// for). Unparseable or ambiguous local times drop that hour.
pub fn to_observations(payload: &HourlyPayload, tz: Tz) -> Vec<WeatherObservation> {
    let Some(hourly) = &payload.hourly else {
        return Vec::new();
    };
    hourly
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok()?;
            let ts = tz
                .from_local_datetime(&naive)
                .earliest()?
                .with_timezone(&Utc);
            Some(WeatherObservation {
                ts,
                temperature_2m: reading(&hourly.temperature_2m, i),
                windspeed_10m: reading(&hourly.windspeed_10m, i),
                precipitation: reading(&hourly.precipitation, i),
            })
        })
        .collect()
}

fn reading(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}
