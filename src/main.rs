use hostel_analytics::{
    AppState, Config, bridge::engine_from_config, identity::FirebaseIdentity, load_data, router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let profiles = load_data(&config.data_path).await;
    let engine = engine_from_config(&config);
    info!(mode = engine.mode(), timeout = ?config.analytics_timeout, "analytics bridge ready");

    let state = AppState::new(
        config.data_path.clone(),
        profiles,
        engine,
        Arc::new(FirebaseIdentity::new(&config.identity)),
    );
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
