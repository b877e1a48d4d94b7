//! Repository for hourly weather observations, keyed by timestamp alone.

use anyhow::Result;
use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::WeatherObservation;

pub struct WeatherStore {
    pool: SqlitePool,
}

impl WeatherStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Same delete-span-then-insert contract as the market series, but over
    /// the single-location weather table.
    pub async fn replace_window(&self, observations: &[WeatherObservation]) -> Result<()> {
        let (start, end) = match observations.iter().map(|o| o.ts).minmax() {
            MinMaxResult::NoElements => return Ok(()),
            MinMaxResult::OneElement(t) => (t, t),
            MinMaxResult::MinMax(a, b) => (a, b),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM weather_hourly WHERE ts >= ?1 AND ts <= ?2")
            .bind(start)
            .bind(end)
            .execute(&mut *tx)
            .await?;

        for obs in observations {
            sqlx::query(
                r#"
                INSERT INTO weather_hourly (ts, temperature_2m, windspeed_10m, precipitation)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(obs.ts)
            .bind(obs.temperature_2m)
            .bind(obs.windspeed_10m)
            .bind(obs.precipitation)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(rows = observations.len(), %start, %end, "replaced weather window");
        Ok(())
    }

    pub async fn find_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>> {
        let rows = sqlx::query_as::<_, WeatherObservation>(
            r#"
            SELECT ts, temperature_2m, windspeed_10m, precipitation
            FROM weather_hourly
            WHERE ts >= ?1 AND ts <= ?2
            ORDER BY ts ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Observed [min, max] timestamp span, or `None` when the table is empty.
    pub async fn coverage(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row = sqlx::query("SELECT MIN(ts) AS min_ts, MAX(ts) AS max_ts FROM weather_hourly")
            .fetch_one(&self.pool)
            .await?;
        let min: Option<DateTime<Utc>> = row.try_get("min_ts")?;
        let max: Option<DateTime<Utc>> = row.try_get("max_ts")?;
        Ok(min.zip(max))
    }
}
