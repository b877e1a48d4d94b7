//! Ingestion driver: chunked backfill of market series plus the hourly
//! weather refresh, with single-flight passes and a per-unit outcome report.

pub mod openmeteo;
pub mod smard;

pub use openmeteo::{HourlyPayload, OpenMeteoClient, WeatherSource};
pub use smard::{IndexSchema, MarketDataSource, SmardClient};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{IngestConfig, WeatherConfig};
use crate::domain::{Metric, Resolution, SeriesPoint};
use crate::store::{TimeSeriesStore, WeatherStore};

/// Outcome of one (region, metric, resolution) unit or the weather refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    Ingested { chunks: usize, rows: usize },
    /// No filter id configured for the metric.
    SkippedUnconfigured,
    /// Payload carried no recognizable data (unknown shape or empty list).
    SkippedNoData,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub region: String,
    pub metric: Metric,
    pub resolution: Resolution,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<UnitReport>,
    pub weather: UnitOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStatus {
    pub running: bool,
    pub last_report: Option<IngestReport>,
}

/// Runs full ingestion passes. Passes are serialized: a trigger while one is
/// in flight is coalesced, never run in parallel.
pub struct Ingestor {
    cfg: IngestConfig,
    weather_cfg: WeatherConfig,
    market: Arc<dyn MarketDataSource>,
    weather: Arc<dyn WeatherSource>,
    series: TimeSeriesStore,
    weather_store: WeatherStore,
    run_guard: Mutex<()>,
    status: RwLock<IngestStatus>,
}

impl Ingestor {
    pub fn new(
        cfg: IngestConfig,
        weather_cfg: WeatherConfig,
        market: Arc<dyn MarketDataSource>,
        weather: Arc<dyn WeatherSource>,
        series: TimeSeriesStore,
        weather_store: WeatherStore,
    ) -> Self {
        Self {
            cfg,
            weather_cfg,
            market,
            weather,
            series,
            weather_store,
            run_guard: Mutex::new(()),
            status: RwLock::new(IngestStatus::default()),
        }
    }

    pub async fn status(&self) -> IngestStatus {
        self.status.read().await.clone()
    }

    /// Run one full pass unless another is already in flight. Returns `false`
    /// when the trigger was coalesced.
    pub async fn try_run(&self) -> bool {
        let Ok(_guard) = self.run_guard.try_lock() else {
            debug!("ingestion pass already running, trigger coalesced");
            return false;
        };

        self.status.write().await.running = true;
        let report = self.run_pass().await;
        let mut status = self.status.write().await;
        status.running = false;
        status.last_report = Some(report);
        true
    }

    /// Iterate the full regions x resolutions x metrics cross-product, then
    /// refresh weather last so a simultaneous forecast sees the widest join
    /// window. Unit failures are recorded and never abort the pass.
    async fn run_pass(&self) -> IngestReport {
        let started_at = Utc::now();
        let mut units = Vec::new();

        for region in &self.cfg.regions {
            for resolution in &self.cfg.resolutions {
                for metric in Metric::iter() {
                    let outcome = match self.cfg.filter_for(metric) {
                        None => UnitOutcome::SkippedUnconfigured,
                        Some(filter) => self
                            .ingest_metric(region, metric, filter, *resolution)
                            .await
                            .unwrap_or_else(|e| {
                                warn!(
                                    %region,
                                    metric = %metric,
                                    resolution = %resolution,
                                    error = %e,
                                    "market ingestion unit failed"
                                );
                                UnitOutcome::Failed { error: e.to_string() }
                            }),
                    };
                    units.push(UnitReport {
                        region: region.clone(),
                        metric,
                        resolution: *resolution,
                        outcome,
                    });
                }
            }
        }

        let weather = self.ingest_weather().await.unwrap_or_else(|e| {
            warn!(error = %e, "weather ingestion failed");
            UnitOutcome::Failed { error: e.to_string() }
        });

        let report = IngestReport {
            started_at,
            finished_at: Utc::now(),
            units,
            weather,
        };
        info!(
            units = report.units.len(),
            ingested = report
                .units
                .iter()
                .filter(|u| matches!(u.outcome, UnitOutcome::Ingested { .. }))
                .count(),
            "ingestion pass finished"
        );
        report
    }

    /// Backfill the most recent chunks for one unit. A chunk fetch failure
    /// skips that chunk only; the unit carries on with the rest.
    async fn ingest_metric(
        &self,
        region: &str,
        metric: Metric,
        filter: &str,
        resolution: Resolution,
    ) -> Result<UnitOutcome> {
        let index = self.market.fetch_index(filter, region, resolution).await?;
        let Some((schema, chunk_ids)) = smard::probe_chunk_index(&index) else {
            warn!(%region, metric = %metric, resolution = %resolution, "index payload shape not recognized");
            return Ok(UnitOutcome::SkippedNoData);
        };
        if chunk_ids.is_empty() {
            return Ok(UnitOutcome::SkippedNoData);
        }
        debug!(%region, metric = %metric, ?schema, total = chunk_ids.len(), "resolved chunk index");

        let recent = &chunk_ids[chunk_ids.len().saturating_sub(self.cfg.backfill_chunks)..];
        let mut chunks = 0;
        let mut rows = 0;
        for &chunk in recent {
            let payload = match self.market.fetch_chunk(filter, region, resolution, chunk).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(chunk, error = %e, "chunk fetch failed, skipping");
                    continue;
                }
            };
            let Some(points) = smard::probe_chunk_points(&payload) else {
                warn!(%region, metric = %metric, chunk, "chunk payload shape not recognized, skipping");
                continue;
            };
            let series: Vec<SeriesPoint> = points
                .into_iter()
                .filter_map(|(ts_ms, value)| {
                    Some(SeriesPoint {
                        ts: DateTime::from_timestamp_millis(ts_ms)?,
                        value: value?,
                    })
                })
                .collect();
            if series.is_empty() {
                continue;
            }
            self.series
                .replace_window(region, metric, resolution, &series)
                .await?;
            chunks += 1;
            rows += series.len();
        }
        // A unit where no chunk yielded data is not a successful ingestion.
        if chunks == 0 {
            return Ok(UnitOutcome::SkippedNoData);
        }
        Ok(UnitOutcome::Ingested { chunks, rows })
    }

    async fn ingest_weather(&self) -> Result<UnitOutcome> {
        let tz: Tz = self
            .weather_cfg
            .timezone
            .parse()
            .map_err(|_| anyhow!("invalid weather timezone '{}'", self.weather_cfg.timezone))?;
        let payload = self
            .weather
            .fetch_hourly(
                self.weather_cfg.latitude,
                self.weather_cfg.longitude,
                &self.weather_cfg.timezone,
            )
            .await?;
        let observations = openmeteo::to_observations(&payload, tz);
        if observations.is_empty() {
            warn!("weather payload carried no usable hours");
            return Ok(UnitOutcome::SkippedNoData);
        }
        self.weather_store.replace_window(&observations).await?;
        Ok(UnitOutcome::Ingested {
            chunks: 1,
            rows: observations.len(),
        })
    }
}

/// Periodic ingestion task, spawned once at startup. The first tick fires
/// immediately so a fresh deployment backfills without waiting an interval.
pub fn spawn_ingest_task(ingestor: Arc<Ingestor>, interval_minutes: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
        loop {
            interval.tick().await;
            info!("starting scheduled ingestion pass");
            ingestor.try_run().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestConfig, WeatherConfig};
    use crate::ingest::openmeteo::HourlyArrays;
    use crate::store::Store;
    use serde_json::{json, Value};

    struct CannedMarket {
        index: Value,
        chunk: Value,
    }

    #[async_trait::async_trait]
    impl MarketDataSource for CannedMarket {
        async fn fetch_index(&self, _: &str, _: &str, _: Resolution) -> Result<Value> {
            Ok(self.index.clone())
        }
        async fn fetch_chunk(&self, _: &str, _: &str, _: Resolution, _: i64) -> Result<Value> {
            Ok(self.chunk.clone())
        }
    }

    struct FailingMarket;

    #[async_trait::async_trait]
    impl MarketDataSource for FailingMarket {
        async fn fetch_index(&self, _: &str, _: &str, _: Resolution) -> Result<Value> {
            Err(anyhow!("connection refused"))
        }
        async fn fetch_chunk(&self, _: &str, _: &str, _: Resolution, _: i64) -> Result<Value> {
            Err(anyhow!("connection refused"))
        }
    }

    struct CannedWeather(HourlyPayload);

    #[async_trait::async_trait]
    impl WeatherSource for CannedWeather {
        async fn fetch_hourly(&self, _: f64, _: f64, _: &str) -> Result<HourlyPayload> {
            Ok(self.0.clone())
        }
    }

    struct SlowWeather;

    #[async_trait::async_trait]
    impl WeatherSource for SlowWeather {
        async fn fetch_hourly(&self, _: f64, _: f64, _: &str) -> Result<HourlyPayload> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(HourlyPayload::default())
        }
    }

    fn cfg() -> IngestConfig {
        IngestConfig {
            interval_minutes: 15,
            base_url: "https://market.example".into(),
            regions: vec!["DE".into()],
            resolutions: vec![Resolution::Hour],
            backfill_chunks: 60,
            http_timeout_seconds: 5,
            load_filter: Some("410".into()),
            wind_filter: None,
            solar_filter: None,
        }
    }

    fn weather_cfg() -> WeatherConfig {
        WeatherConfig {
            latitude: 52.52,
            longitude: 13.405,
            timezone: "UTC".into(),
            http_timeout_seconds: 5,
        }
    }

    fn weather_payload() -> HourlyPayload {
        HourlyPayload {
            hourly: Some(HourlyArrays {
                time: vec!["2024-01-01T00:00".into(), "2024-01-01T01:00".into()],
                temperature_2m: vec![Some(2.0), Some(3.0)],
                windspeed_10m: vec![Some(5.0), Some(4.0)],
                precipitation: vec![Some(0.0), Some(0.1)],
            }),
        }
    }

    async fn ingestor(
        market: Arc<dyn MarketDataSource>,
        weather: Arc<dyn WeatherSource>,
    ) -> (Ingestor, Store) {
        let store = Store::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        let ingestor = Ingestor::new(
            cfg(),
            weather_cfg(),
            market,
            weather,
            store.timeseries(),
            store.weather(),
        );
        (ingestor, store)
    }

    #[tokio::test]
    async fn pass_writes_market_and_weather_rows() {
        // 2024-01-01T00:00Z and T01:00Z in epoch milliseconds.
        let market = CannedMarket {
            index: json!({"timestamps": [1704067200000i64]}),
            chunk: json!({"series": [[1704067200000i64, 42.0], [1704070800000i64, 43.5], [1704074400000i64, null]]}),
        };
        let (ingestor, store) =
            ingestor(Arc::new(market), Arc::new(CannedWeather(weather_payload()))).await;

        assert!(ingestor.try_run().await);

        let report = ingestor.status().await.last_report.unwrap();
        let load = report
            .units
            .iter()
            .find(|u| u.metric == Metric::Load)
            .unwrap();
        // The null-valued point is dropped before persistence.
        assert_eq!(load.outcome, UnitOutcome::Ingested { chunks: 1, rows: 2 });
        assert_eq!(report.weather, UnitOutcome::Ingested { chunks: 1, rows: 2 });

        let coverage = store.weather().coverage().await.unwrap();
        assert!(coverage.is_some());
    }

    #[tokio::test]
    async fn unconfigured_metrics_are_skipped() {
        let market = CannedMarket {
            index: json!({"timestamps": []}),
            chunk: json!({}),
        };
        let (ingestor, _store) =
            ingestor(Arc::new(market), Arc::new(CannedWeather(weather_payload()))).await;
        ingestor.try_run().await;

        let report = ingestor.status().await.last_report.unwrap();
        let wind = report
            .units
            .iter()
            .find(|u| u.metric == Metric::Wind)
            .unwrap();
        assert_eq!(wind.outcome, UnitOutcome::SkippedUnconfigured);
    }

    #[tokio::test]
    async fn unrecognized_index_payload_skips_unit_without_writing() {
        let market = CannedMarket {
            index: json!({"chunks": [1, 2, 3]}),
            chunk: json!({"series": [[1704067200000i64, 42.0]]}),
        };
        let (ingestor, store) =
            ingestor(Arc::new(market), Arc::new(CannedWeather(weather_payload()))).await;
        ingestor.try_run().await;

        let report = ingestor.status().await.last_report.unwrap();
        let load = report
            .units
            .iter()
            .find(|u| u.metric == Metric::Load)
            .unwrap();
        assert_eq!(load.outcome, UnitOutcome::SkippedNoData);

        let rows = store
            .timeseries()
            .find_range(
                "DE",
                Metric::Load,
                Resolution::Hour,
                DateTime::from_timestamp_millis(0).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_chunk_payload_reports_no_data() {
        // The index resolves, but every chunk hides its points under an
        // unknown key. That must not read as a successful ingestion.
        let market = CannedMarket {
            index: json!({"timestamps": [1704067200000i64]}),
            chunk: json!({"points": [[1704067200000i64, 42.0]]}),
        };
        let (ingestor, store) =
            ingestor(Arc::new(market), Arc::new(CannedWeather(weather_payload()))).await;
        ingestor.try_run().await;

        let report = ingestor.status().await.last_report.unwrap();
        let load = report
            .units
            .iter()
            .find(|u| u.metric == Metric::Load)
            .unwrap();
        assert_eq!(load.outcome, UnitOutcome::SkippedNoData);

        let rows = store
            .timeseries()
            .find_range(
                "DE",
                Metric::Load,
                Resolution::Hour,
                DateTime::from_timestamp_millis(0).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn market_failure_does_not_abort_weather_refresh() {
        let (ingestor, store) = ingestor(
            Arc::new(FailingMarket),
            Arc::new(CannedWeather(weather_payload())),
        )
        .await;
        ingestor.try_run().await;

        let report = ingestor.status().await.last_report.unwrap();
        assert!(report
            .units
            .iter()
            .any(|u| matches!(u.outcome, UnitOutcome::Failed { .. })));
        assert_eq!(report.weather, UnitOutcome::Ingested { chunks: 1, rows: 2 });
        assert!(store.weather().coverage().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_trigger_is_coalesced() {
        let market = CannedMarket {
            index: json!({"timestamps": []}),
            chunk: json!({}),
        };
        let (ingestor, _store) = ingestor(Arc::new(market), Arc::new(SlowWeather)).await;
        let ingestor = Arc::new(ingestor);

        // The first future grabs the run guard at its first poll; the second
        // then observes a held lock and bails.
        let (first, second) = tokio::join!(ingestor.try_run(), ingestor.try_run());
        assert!(first);
        assert!(!second);
    }
}
