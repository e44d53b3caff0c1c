//! Production gateway: environment configuration, TCP connection
//! supervisor, session registry, sink dispatcher, and status HTTP server.
//!
//! This crate is the production "glue" wrapping `teltonika-core`'s Sans-IO
//! session engine with real sockets, a real HTTP sink client, and a real
//! clock — the same split the teacher's `lockframe-server` makes over
//! `lockframe-core`.

mod connection;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod registry;
pub mod status;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;

pub use dispatcher::SinkDispatcher;
pub use env::Config;
pub use error::GatewayError;
pub use registry::SessionRegistry;
use tokio::sync::watch;

/// Grace period given to in-flight work after a shutdown signal, before the
/// process exits, per spec.md §4.G.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runs the gateway until a shutdown signal is received, then returns.
///
/// Binds both listeners before spawning anything, so a bind failure is
/// reported before any connection could be accepted.
pub async fn run(config: Config) -> Result<(), GatewayError> {
    let registry = Arc::new(SessionRegistry::new());
    let dispatcher = SinkDispatcher::spawn(&config.fleet_api_url, &config.shared_secret);

    let tcp_listener = supervisor::bind(config.tcp_port).await?;
    tracing::info!(port = config.tcp_port, "device listener bound");

    let status_address = format!("0.0.0.0:{}", config.status_port);
    let status_listener = tokio::net::TcpListener::bind(&status_address)
        .await
        .map_err(|source| GatewayError::Bind { address: status_address, source })?;
    tracing::info!(port = config.status_port, "status listener bound");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let status_router = status::router(Arc::clone(&registry));

    let supervisor_task =
        tokio::spawn(supervisor::run(tcp_listener, dispatcher, Arc::clone(&registry), shutdown_rx.clone()));
    let status_task = tokio::spawn(async move {
        let mut shutdown_rx = shutdown_rx;
        axum::serve(status_listener, status_router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping acceptors");
    let _ = shutdown_tx.send(true);

    let _ = supervisor_task.await;
    let _ = status_task.await;

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(message = %error, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        },
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
