//! Shared state for the HTTP server.

use std::sync::Arc;

use spout_attach::AttachManager;
use spout_routes::RouteManager;

use crate::config::ServerConfig;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    config: Arc<ServerConfig>,
    attacher: AttachManager,
    routes: RouteManager,
}

impl AppState {
    /// Create the shared state.
    pub fn new(config: ServerConfig, attacher: AttachManager, routes: RouteManager) -> Self {
        Self {
            config: Arc::new(config),
            attacher,
            routes,
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Attach manager that live log subscriptions are made against.
    pub fn attacher(&self) -> &AttachManager {
        &self.attacher
    }

    /// Route registry.
    pub fn routes(&self) -> &RouteManager {
        &self.routes
    }
}
