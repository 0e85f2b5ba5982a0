use std::sync::Arc;

use fulfillment_dispatch::api;
use fulfillment_dispatch::config::Config;
use fulfillment_dispatch::directory::Seed;
use fulfillment_dispatch::engine::queue::run_fulfillment_engine;
use fulfillment_dispatch::error::AppError;
use fulfillment_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let (app_state, payment_rx) = AppState::new(&config);

    if let Some(path) = config.seed_path.as_deref() {
        let summary = Seed::from_path(path)?.apply(&app_state)?;
        tracing::info!(path, workers = summary.workers, "directory seed loaded");
    } else {
        tracing::warn!("no SEED_PATH configured; starting with an empty directory");
    }

    let shared_state = Arc::new(app_state);
    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_fulfillment_engine(shared_state.clone(), payment_rx));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        lead_time_days = config.fulfillment.lead_time_days,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
