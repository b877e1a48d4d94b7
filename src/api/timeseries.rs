use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    api::error::ApiError,
    app::AppState,
    domain::{Metric, Resolution, SeriesPoint},
};

#[derive(Debug, Deserialize)]
pub struct TimeseriesQuery {
    pub region: Option<String>,
    pub metric: Metric,
    pub resolution: Option<Resolution>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// GET /api/v1/timeseries - stored rows for a key within [start, end]
pub async fn get_timeseries(
    State(state): State<AppState>,
    Query(query): Query<TimeseriesQuery>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError> {
    if query.end < query.start {
        return Err(ApiError::BadRequest("end must not precede start".into()));
    }
    let region = query
        .region
        .unwrap_or_else(|| state.cfg.forecast.default_region.clone());
    let resolution = query.resolution.unwrap_or(Resolution::Hour);

    let rows = state
        .series
        .find_range(&region, query.metric, resolution, query.start, query.end)
        .await?;
    Ok(Json(rows))
}
