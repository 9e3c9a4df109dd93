use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use common::config::AppConfig;
use medicine_server::{app, state::AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).json().init();

    let config_path = std::env::var("MEDISEARCH_CONFIG")
        .map_or_else(|_| PathBuf::from("medisearch.toml"), PathBuf::from);
    let config = AppConfig::load(&config_path)?;
    let allow_non_local = std::env::var("MEDISEARCH_ALLOW_NON_LOCAL")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let addr = build_bind_addr(&config.bind_addr, config.port, allow_non_local)?;

    let state = AppState::from_config(&config)?;
    info!(
        records = state.searcher.handle().current().len(),
        snapshot = %config.snapshot_path,
        "catalog loaded"
    );
    info!("medicine-server listening on http://{addr}");
    info!("Search endpoint: http://{addr}/search");
    info!("Metrics endpoint: http://{addr}/metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("medicine-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable, waiting for ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn build_bind_addr(host: &str, port: u16, allow_non_local: bool) -> anyhow::Result<SocketAddr> {
    let ip = host.parse::<IpAddr>()?;
    if !ip.is_loopback() && !allow_non_local {
        anyhow::bail!("non-local bind requested for {ip}, set MEDISEARCH_ALLOW_NON_LOCAL=true to opt in");
    }
    Ok(SocketAddr::new(ip, port))
}
