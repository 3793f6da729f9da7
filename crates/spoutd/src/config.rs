//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use clap::builder::FalseyValueParser;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use spout_attach::{AttachConfig, DEFAULT_DOCKER_HOST};
use spout_http::{DEFAULT_PORT, ServerConfig};
use spout_routes::{Route, Target};
use url::Url;

/// `$NAME` or `${NAME}`.
static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .unwrap_or_else(|_| unreachable!())
});

/// Daemon settings. Every option can also come from the environment.
#[derive(Debug, Parser)]
#[command(name = "spoutd")]
#[command(about = "Routes container logs to syslog, UDP and search sinks")]
#[command(version)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Docker endpoint
    #[arg(long, env = "DOCKER_HOST", default_value = DEFAULT_DOCKER_HOST)]
    pub docker_host: String,

    /// Directory holding persisted routes; persistence is off if it does not exist
    #[arg(long, env = "ROUTESPATH", default_value = "/var/lib/spout")]
    pub routes_path: PathBuf,

    /// Per-listener record buffer
    #[arg(long, env = "LISTENER_BUFFER", default_value_t = 256)]
    pub listener_buffer: usize,

    /// How long a full listener may stall delivery before it is evicted, in milliseconds
    #[arg(long, env = "DELIVERY_TIMEOUT_MS", default_value_t = 1000)]
    pub delivery_timeout_ms: u64,

    /// How long a dead container's output may keep draining, in milliseconds
    #[arg(long, env = "DRAIN_GRACE_MS", default_value_t = 5000)]
    pub drain_grace_ms: u64,

    /// Longest partial line held before it is forwarded without its newline
    #[arg(long, env = "MAX_LINE_BYTES", default_value_t = 64 * 1024)]
    pub max_line_bytes: usize,

    /// Route every container to this sink, e.g. `syslog://logs.example.com:514`
    pub route: Option<String>,
}

impl Cli {
    /// Attach manager settings.
    #[must_use]
    pub fn attach_config(&self) -> AttachConfig {
        AttachConfig::default()
            .with_listener_buffer(self.listener_buffer)
            .with_delivery_timeout(Duration::from_millis(self.delivery_timeout_ms))
            .with_drain_grace(Duration::from_millis(self.drain_grace_ms))
            .with_max_line(self.max_line_bytes)
    }

    /// HTTP server settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default().with_port(self.port)
    }

    /// Default log filter when `RUST_LOG` is unset.
    #[must_use]
    pub const fn default_log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    /// The initial route given on the command line, with environment
    /// references expanded.
    pub fn initial_route(&self) -> anyhow::Result<Option<(String, Route)>> {
        let Some(uri) = &self.route else {
            return Ok(None);
        };
        let expanded = expand_env(uri, |name| std::env::var(name).ok());
        let route = route_from_uri(&expanded)?;
        Ok(Some((expanded, route)))
    }
}

/// Replaces `$NAME` and `${NAME}` with values from `lookup`; unknown names
/// expand to nothing.
pub fn expand_env(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures<'_>| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|name| lookup(name.as_str()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Builds an unrestricted route from `scheme://host[:port]`. The scheme is
/// the target type and `host:port` the address.
pub fn route_from_uri(uri: &str) -> anyhow::Result<Route> {
    let url = Url::parse(uri).with_context(|| format!("invalid route uri {uri:?}"))?;
    let Some(host) = url.host_str().filter(|host| !host.is_empty()) else {
        bail!("route uri {uri:?} has no host");
    };
    let addr = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(Route::new(Target::new(url.scheme(), addr)))
}
