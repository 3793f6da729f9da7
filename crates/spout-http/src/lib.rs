//! # spout-http
//!
//! HTTP surface of the spout log router, built on axum.
//!
//! Clients can tail container output live, as plain text, JSON lines or
//! websocket frames, and manage the persisted routes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spout_http::{ServerConfig, SpoutServer};
//!
//! let server = SpoutServer::new(ServerConfig::default(), attacher, routes);
//! server.serve_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/logs` | GET | Stream every container |
//! | `/logs/{id,name,filter}:<value>` | GET | Stream selected containers |
//! | `/routes` | GET | List routes |
//! | `/routes` | POST | Add a route |
//! | `/routes/{id}` | GET | Show a route |
//! | `/routes/{id}` | DELETE | Remove a route |
//!
//! Log endpoints take `types=stdout,stderr` (alias `type`) and `colors=off`,
//! honour `Accept: application/json`, and upgrade to a websocket when asked.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod format;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream;
pub mod websocket;

// Re-export main types
pub use config::{DEFAULT_NAME_WIDTH, DEFAULT_PORT, ServerConfig};
pub use error::{HttpError, HttpResult};
pub use format::{LineFormatter, OutputMode};
pub use routes::create_router;
pub use server::SpoutServer;
pub use state::AppState;
