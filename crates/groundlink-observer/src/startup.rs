//! Observer startup helper for embedding in the relay binary.
//!
//! [`spawn_observer`] binds the listener eagerly, so a port already in use
//! fails startup, then serves on a background Tokio task alongside the
//! relay loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),

    /// The bound address could not be read back.
    #[error("cannot read bound address: {0}")]
    LocalAddr(#[from] std::io::Error),
}

/// A running observer server.
#[derive(Debug)]
pub struct ObserverHandle {
    /// The address actually bound (resolves port `0`).
    pub addr: SocketAddr,
    /// The serving task.
    pub task: JoinHandle<Result<(), ServerError>>,
}

/// Spawn the observer HTTP + `WebSocket` server on a background task.
///
/// The server runs until `shutdown` completes.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot be
/// bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<ObserverHandle, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener.local_addr()?;

    let task = tokio::spawn(server::serve(listener, state, shutdown));
    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(ObserverHandle { addr, task })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn binds_and_shuts_down() {
        let config = ServerConfig {
            host: String::from("127.0.0.1"),
            port: 0,
        };
        let (tx, rx) = oneshot::channel::<()>();
        let handle = spawn_observer(&config, Arc::new(AppState::default()), async {
            let _ = rx.await;
        })
        .await
        .unwrap();
        assert_ne!(handle.addr.port(), 0);

        tx.send(()).unwrap();
        handle.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn port_in_use_fails_startup() {
        let config = ServerConfig {
            host: String::from("127.0.0.1"),
            port: 0,
        };
        let (tx, rx) = oneshot::channel::<()>();
        let first = spawn_observer(&config, Arc::new(AppState::default()), async {
            let _ = rx.await;
        })
        .await
        .unwrap();

        let taken = ServerConfig {
            host: String::from("127.0.0.1"),
            port: first.addr.port(),
        };
        let second = spawn_observer(&taken, Arc::new(AppState::default()), async {}).await;
        assert!(matches!(second, Err(StartupError::Server(ServerError::Bind(_)))));

        tx.send(()).unwrap();
        first.task.await.unwrap().unwrap();
    }
}
