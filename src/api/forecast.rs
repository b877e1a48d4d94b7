use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{api::error::ApiError, app::AppState, domain::ForecastPoint, forecast};

#[derive(Debug, Deserialize, Validate)]
pub struct ForecastQuery {
    pub region: Option<String>,
    #[serde(default = "default_horizon")]
    #[validate(range(min = 1, max = 72))]
    pub horizon: u32,
}

fn default_horizon() -> u32 {
    24
}

/// GET /api/v1/forecast - hourly load forecast for a region
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Vec<ForecastPoint>>, ApiError> {
    query.validate()?;
    let region = query
        .region
        .unwrap_or_else(|| state.cfg.forecast.default_region.clone());
    if !state.cfg.ingest.regions.contains(&region) {
        return Err(ApiError::ValidationError(format!(
            "unknown region '{region}'"
        )));
    }

    let points = forecast::forecast_load(
        &state.series,
        &state.weather,
        &state.cfg.forecast,
        &region,
        query.horizon,
    )
    .await?;
    Ok(Json(points))
}
