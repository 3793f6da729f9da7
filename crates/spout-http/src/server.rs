//! HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use spout_attach::AttachManager;
use spout_routes::RouteManager;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{HttpError, HttpResult};
use crate::routes::create_router;
use crate::state::AppState;

/// Serves live log streams and the route registry over HTTP.
#[derive(Debug, Clone)]
pub struct SpoutServer {
    state: Arc<AppState>,
}

impl SpoutServer {
    /// Create a server over the given managers.
    #[must_use]
    pub fn new(config: ServerConfig, attacher: AttachManager, routes: RouteManager) -> Self {
        Self {
            state: Arc::new(AppState::new(config, attacher, routes)),
        }
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Address from the configuration.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config().bind_addr
    }

    /// Serve on the configured address until `shutdown` completes.
    ///
    /// Open log streams keep the graceful shutdown waiting, so callers
    /// should end subscriptions (for example by shutting down the attach
    /// manager) once `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> HttpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpError::BindFailed(addr, e))?;

        info!(addr = %addr, "serving http");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HttpError::Internal(e.to_string()))?;

        info!("http server shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}
