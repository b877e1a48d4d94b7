//! Repository for the (region, metric, resolution, ts) keyed market series.

use anyhow::Result;
use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use sqlx::SqlitePool;
use tracing::debug;

use crate::domain::{Metric, Resolution, SeriesPoint};

pub struct TimeSeriesStore {
    pool: SqlitePool,
}

impl TimeSeriesStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace every stored row for the key whose timestamp falls inside the
    /// span covered by `points`, then insert the new rows. Delete and insert
    /// run in one transaction so a concurrent reader never observes a
    /// half-replaced window. Empty input is a no-op.
    pub async fn replace_window(
        &self,
        region: &str,
        metric: Metric,
        resolution: Resolution,
        points: &[SeriesPoint],
    ) -> Result<()> {
        let (start, end) = match points.iter().map(|p| p.ts).minmax() {
            MinMaxResult::NoElements => return Ok(()),
            MinMaxResult::OneElement(t) => (t, t),
            MinMaxResult::MinMax(a, b) => (a, b),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM timeseries
            WHERE region = ?1 AND metric = ?2 AND resolution = ?3
              AND ts >= ?4 AND ts <= ?5
            "#,
        )
        .bind(region)
        .bind(metric.to_string())
        .bind(resolution.to_string())
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await?;

        for point in points {
            sqlx::query(
                r#"
                INSERT INTO timeseries (region, metric, resolution, ts, value)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(region)
            .bind(metric.to_string())
            .bind(resolution.to_string())
            .bind(point.ts)
            .bind(point.value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            region,
            metric = %metric,
            resolution = %resolution,
            rows = points.len(),
            %start,
            %end,
            "replaced series window"
        );
        Ok(())
    }

    /// Rows for a key within [start, end], ordered by timestamp.
    pub async fn find_range(
        &self,
        region: &str,
        metric: Metric,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesPoint>> {
        let rows = sqlx::query_as::<_, SeriesPoint>(
            r#"
            SELECT ts, value FROM timeseries
            WHERE region = ?1 AND metric = ?2 AND resolution = ?3
              AND ts >= ?4 AND ts <= ?5
            ORDER BY ts ASC
            "#,
        )
        .bind(region)
        .bind(metric.to_string())
        .bind(resolution.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::TimeZone;

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(h)
    }

    fn points(hours: impl IntoIterator<Item = (i64, f64)>) -> Vec<SeriesPoint> {
        hours
            .into_iter()
            .map(|(h, value)| SeriesPoint { ts: hour(h), value })
            .collect()
    }

    async fn store() -> TimeSeriesStore {
        let store = Store::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.timeseries()
    }

    #[tokio::test]
    async fn replace_window_is_idempotent() {
        let repo = store().await;
        let batch = points([(0, 1.0), (1, 2.0), (2, 3.0)]);

        repo.replace_window("DE", Metric::Load, Resolution::Hour, &batch)
            .await
            .unwrap();
        repo.replace_window("DE", Metric::Load, Resolution::Hour, &batch)
            .await
            .unwrap();

        let rows = repo
            .find_range("DE", Metric::Load, Resolution::Hour, hour(0), hour(2))
            .await
            .unwrap();
        assert_eq!(rows, batch);
    }

    #[tokio::test]
    async fn replace_window_only_touches_covered_span() {
        let repo = store().await;
        repo.replace_window(
            "DE",
            Metric::Load,
            Resolution::Hour,
            &points([(0, 10.0), (1, 11.0), (5, 15.0)]),
        )
        .await
        .unwrap();

        // Refresh [1, 3]; the rows at hours 0 and 5 must survive untouched.
        repo.replace_window(
            "DE",
            Metric::Load,
            Resolution::Hour,
            &points([(1, 21.0), (2, 22.0), (3, 23.0)]),
        )
        .await
        .unwrap();

        let rows = repo
            .find_range("DE", Metric::Load, Resolution::Hour, hour(0), hour(5))
            .await
            .unwrap();
        assert_eq!(
            rows,
            points([(0, 10.0), (1, 21.0), (2, 22.0), (3, 23.0), (5, 15.0)])
        );
    }

    #[tokio::test]
    async fn replace_window_is_scoped_to_its_key() {
        let repo = store().await;
        repo.replace_window("DE", Metric::Wind, Resolution::Hour, &points([(0, 5.0)]))
            .await
            .unwrap();
        repo.replace_window("DE", Metric::Load, Resolution::Hour, &points([(0, 9.0)]))
            .await
            .unwrap();

        let wind = repo
            .find_range("DE", Metric::Wind, Resolution::Hour, hour(0), hour(0))
            .await
            .unwrap();
        assert_eq!(wind, points([(0, 5.0)]));
    }

    #[tokio::test]
    async fn empty_input_deletes_nothing() {
        let repo = store().await;
        repo.replace_window("DE", Metric::Load, Resolution::Hour, &points([(0, 1.0)]))
            .await
            .unwrap();
        repo.replace_window("DE", Metric::Load, Resolution::Hour, &[])
            .await
            .unwrap();

        let rows = repo
            .find_range("DE", Metric::Load, Resolution::Hour, hour(0), hour(0))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
