pub mod error;
pub mod forecast;
pub mod health;
pub mod ingest;
pub mod timeseries;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{app::AppState, config::Config};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", v1(state));

    if cfg.server.enable_cors {
        use tower_http::cors::{Any, CorsLayer};
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    // tower-http 0.6 deprecates `new` in favor of picking a status code; the
    // default 408 is the one we want.
    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs));

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(timeout),
        )
        .layer(TraceLayer::new_for_http())
}

fn v1(state: AppState) -> Router {
    Router::new()
        .route("/timeseries", get(timeseries::get_timeseries))
        .route("/forecast", get(forecast::get_forecast))
        .route("/ingest/run", post(ingest::trigger_ingest))
        .route("/ingest/status", get(ingest::ingest_status))
        .with_state(state)
}
