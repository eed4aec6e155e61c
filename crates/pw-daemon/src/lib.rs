//! # pw-daemon
//!
//! The patchwire network service.
//!
//! Serves the HTTP API (tasks, changes, patch submission, checker endpoints,
//! filesystem and git operations, status) and the Server-Sent Events push
//! channel on `/api/events`. All state lives in one [`AppState`] built at
//! startup from a [`DaemonConfig`]; there is no ambient global.
//!
//! ## Usage
//!
//! ```text
//! pw-daemon --workspace ./my-repo --port 3000
//! ```
//!
//! Configuration is read from `<workspace>/.pw/daemon.toml` when present.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;

use std::future::Future;
use std::sync::Arc;

pub use api::router;
pub use config::{CheckerConfig, DaemonConfig};
pub use error::{ApiError, ConfigError};
pub use state::AppState;

/// Bind and serve until `shutdown` resolves.
///
/// Open push-channel streams are closed when shutdown begins so graceful
/// shutdown does not wait on them.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = state.config().socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "patchwire daemon listening");

    let channel = state.channel().clone();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            channel.shutdown();
            tracing::info!("shutting down");
        })
        .await
}
