use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::domain::{Metric, Resolution};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub ingest: IngestConfig,
    pub weather: WeatherConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub interval_minutes: u64,
    pub base_url: String,
    pub regions: Vec<String>,
    pub resolutions: Vec<Resolution>,
    /// How many of the most recent index chunks to refresh per unit.
    pub backfill_chunks: usize,
    pub http_timeout_seconds: u64,
    pub load_filter: Option<String>,
    pub wind_filter: Option<String>,
    pub solar_filter: Option<String>,
}

impl IngestConfig {
    /// Upstream filter id for a metric; `None` means the metric is skipped.
    pub fn filter_for(&self, metric: Metric) -> Option<&str> {
        let filter = match metric {
            Metric::Load => &self.load_filter,
            Metric::Wind => &self.wind_filter,
            Metric::Solar => &self.solar_filter,
        };
        filter.as_deref().filter(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone the upstream hourly payload is expressed in.
    pub timezone: String,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub default_region: String,
    pub join_tolerance_minutes: i64,
    pub min_training_rows: usize,
    pub max_horizon: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EFS__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ingest() -> IngestConfig {
        IngestConfig {
            interval_minutes: 15,
            base_url: "https://market.example".into(),
            regions: vec!["DE".into()],
            resolutions: vec![Resolution::Hour],
            backfill_chunks: 60,
            http_timeout_seconds: 30,
            load_filter: Some("410".into()),
            wind_filter: Some(String::new()),
            solar_filter: None,
        }
    }

    #[test]
    fn filter_lookup_skips_unconfigured_metrics() {
        let cfg = sample_ingest();
        assert_eq!(cfg.filter_for(Metric::Load), Some("410"));
        assert_eq!(cfg.filter_for(Metric::Wind), None);
        assert_eq!(cfg.filter_for(Metric::Solar), None);
    }
}
