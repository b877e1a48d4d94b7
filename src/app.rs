use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ingest::{Ingestor, MarketDataSource, OpenMeteoClient, SmardClient, WeatherSource};
use crate::store::{Store, TimeSeriesStore, WeatherStore};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub series: Arc<TimeSeriesStore>,
    pub weather: Arc<WeatherStore>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = Store::connect(&cfg.db.url, cfg.db.max_connections).await?;
        store.migrate().await?;

        let market: Arc<dyn MarketDataSource> = Arc::new(SmardClient::new(
            cfg.ingest.base_url.clone(),
            Duration::from_secs(cfg.ingest.http_timeout_seconds),
        )?);
        let weather_source: Arc<dyn WeatherSource> = Arc::new(OpenMeteoClient::new(
            Duration::from_secs(cfg.weather.http_timeout_seconds),
        )?);
        let ingestor = Arc::new(Ingestor::new(
            cfg.ingest.clone(),
            cfg.weather.clone(),
            market,
            weather_source,
            store.timeseries(),
            store.weather(),
        ));

        Ok(Self {
            series: Arc::new(store.timeseries()),
            weather: Arc::new(store.weather()),
            ingestor,
            cfg,
        })
    }
}
