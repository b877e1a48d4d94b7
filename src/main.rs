use anyhow::Result;
use energy_forecast_service::{api, app::AppState, config::Config, ingest, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let state = AppState::new(cfg.clone()).await?;

    ingest::spawn_ingest_task(state.ingestor.clone(), cfg.ingest.interval_minutes);

    let app = api::router(state, &cfg);
    let addr = cfg.server.socket_addr()?;
    info!(%addr, "starting energy forecast service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}
