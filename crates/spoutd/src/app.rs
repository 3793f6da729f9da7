//! Daemon startup and shutdown.

use std::sync::Arc;

use anyhow::Context;
use spout_attach::{AttachManager, DockerRuntime};
use spout_http::SpoutServer;
use spout_routes::{RouteFileStore, RouteManager};
use tracing::{info, warn};

use crate::config::Cli;

/// Runs the daemon until interrupted.
///
/// Startup order: connect to Docker, attach to running containers, add the
/// command line route (never persisted), load persisted routes if the routes
/// directory exists, then serve HTTP. Any failure before serving is fatal.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = DockerRuntime::connect_to(&cli.docker_host)
        .with_context(|| format!("cannot reach docker at {}", cli.docker_host))?;
    let attacher = AttachManager::start(Arc::new(runtime), cli.attach_config())
        .await
        .context("cannot attach to running containers")?;
    let routes = RouteManager::new(attacher.clone());

    if let Some((uri, route)) = cli.initial_route()? {
        info!(uri = %uri, "routing all containers");
        routes
            .add(route)
            .await
            .with_context(|| format!("cannot route to {uri}"))?;
    }

    if cli.routes_path.exists() {
        info!(path = %cli.routes_path.display(), "loading and persisting routes");
        let store = RouteFileStore::open(&cli.routes_path)
            .with_context(|| format!("cannot open routes in {}", cli.routes_path.display()))?;
        routes
            .load(Arc::new(store))
            .await
            .context("cannot load persisted routes")?;
    } else {
        warn!(path = %cli.routes_path.display(), "routes directory missing, routes will not persist");
    }

    let server = SpoutServer::new(cli.server_config(), attacher.clone(), routes.clone());
    let shutdown = {
        let attacher = attacher.clone();
        async move {
            shutdown_signal().await;
            info!("shutting down");
            // ends every open log stream so the server can drain
            attacher.shutdown();
        }
    };
    server.serve_with_shutdown(shutdown).await?;

    routes.shutdown().await;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
