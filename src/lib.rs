pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod state;
pub mod background;

use crate::config::Config;
use crate::error::AppError;
use crate::infra::factory::bootstrap_state;
use api::router::create_router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use crate::background::start_background_worker;

pub fn init_logging(log_dir: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "admission-service.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("info,admission_backend=debug"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized. Writing JSON logs to {}/", log_dir);
    guard
}

pub async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let _guard = init_logging(&config.log_dir);

    let state = bootstrap_state(&config).await?;
    let state_arc = Arc::new(state);

    let worker_state = state_arc.clone();
    tokio::spawn(async move {
        start_background_worker(worker_state).await;
    });

    let app = create_router(state_arc);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(|e| AppError::Config(format!("could not bind port {}: {e}", config.port)))?;

    info!("Admission service listening on port {}", config.port);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("server error: {e}")))?;
    Ok(())
}
