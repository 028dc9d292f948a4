use anyhow::{Context, Result};
use ptz_gateway::{AppState, CameraRegistry, OnvifConnector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let bind_addr: std::net::SocketAddr = std::env::var("PTZ_GATEWAY_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8086".to_string())
        .parse()
        .context("invalid bind address")?;

    let device_timeout_secs = std::env::var("DEVICE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let registry = Arc::new(CameraRegistry::from_env());
    info!(cameras = registry.len(), "camera registry loaded");

    let connector = Arc::new(OnvifConnector::new(device_timeout_secs));
    let state = AppState::new(registry, connector);
    let app = ptz_gateway::routes::router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "ptz-gateway listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
