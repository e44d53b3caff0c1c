//! TCP accept loop: one task per connection, clean shutdown on signal.
//!
//! Grounded on the teacher's `lockframe-server::Server::run` (accept loop,
//! `tokio::spawn` per connection, error containment so one bad accept or
//! connection never takes down the listener), adapted from Quinn's
//! `Endpoint::accept` to `TcpListener::accept` and extended with a
//! `tokio::select!` against a shutdown signal per spec.md §4.G.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::dispatcher::SinkDispatcher;
use crate::registry::SessionRegistry;
use crate::{connection, error::GatewayError};

/// Runs the accept loop until `shutdown` fires, spawning one task per
/// accepted connection. Returns once the listener has stopped accepting;
/// in-flight connection tasks are not awaited here (the caller applies the
/// shutdown grace period).
pub async fn run(
    listener: TcpListener,
    dispatcher: SinkDispatcher,
    registry: Arc<SessionRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, remote_addr)) => {
                        let dispatcher = dispatcher.clone();
                        let registry = Arc::clone(&registry);
                        tokio::spawn(async move {
                            connection::handle(stream, remote_addr, dispatcher, registry).await;
                        });
                    },
                    Err(error) => {
                        tracing::error!(message = %error, "accept failed");
                    },
                }
            },
            _ = shutdown.changed() => {
                tracing::info!("supervisor stopping: no longer accepting connections");
                break;
            },
        }
    }
}

/// Binds the device-facing TCP listener.
pub async fn bind(port: u16) -> Result<TcpListener, GatewayError> {
    let address = format!("0.0.0.0:{port}");
    TcpListener::bind(&address)
        .await
        .map_err(|source| GatewayError::Bind { address, source })
}
