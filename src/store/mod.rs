//! SQLite-backed persistence for market series and hourly weather.

pub mod timeseries;
pub mod weather;

pub use timeseries::TimeSeriesStore;
pub use weather::WeatherStore;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS timeseries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region TEXT NOT NULL,
    metric TEXT NOT NULL,
    resolution TEXT NOT NULL,
    ts TEXT NOT NULL,
    value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_timeseries_lookup
    ON timeseries (region, metric, resolution, ts);

CREATE TABLE IF NOT EXISTS weather_hourly (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    temperature_2m REAL,
    windspeed_10m REAL,
    precipitation REAL
);
CREATE INDEX IF NOT EXISTS ix_weather_hourly_ts ON weather_hourly (ts);
"#;

/// Connection pool plus schema management. Repositories are cheap handles
/// cloned off the pool.
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .with_context(|| format!("failed to open store at {url}"))?;
        Ok(Self { pool })
    }

    /// In-memory store for tests. A single connection keeps every handle on
    /// the same database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Idempotent schema creation, run once at startup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("schema migration failed")?;
        info!("store schema ready");
        Ok(())
    }

    pub fn timeseries(&self) -> TimeSeriesStore {
        TimeSeriesStore::new(self.pool.clone())
    }

    pub fn weather(&self) -> WeatherStore {
        WeatherStore::new(self.pool.clone())
    }
}
