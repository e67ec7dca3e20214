use daily_anchor::{AppState, Config, FileStorage, Repository, SystemClock, Tracker, router};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let storage = FileStorage::open(&config.data_dir)?;
    info!("storing data in {}", storage.dir().display());

    let tracker = Tracker::new(
        Arc::new(SystemClock),
        Repository::new(Arc::new(storage)),
        config.min_session_secs,
    );
    let state = AppState::new(tracker);
    state.sync_ticker().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
