//! HTTP server configuration.

use std::net::SocketAddr;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Minimum width of the name column in multi-container text output.
pub const DEFAULT_NAME_WIDTH: usize = 16;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Starting width of the name column; grows to the longest name seen.
    pub name_width: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            name_width: DEFAULT_NAME_WIDTH,
        }
    }
}

impl ServerConfig {
    /// Create a configuration bound to `bind_addr`.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Listen on all interfaces at `port`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the starting name column width.
    #[must_use]
    pub const fn with_name_width(mut self, width: usize) -> Self {
        self.name_width = width;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.name_width, 16);
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::default().with_port(9000).with_name_width(20);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.name_width, 20);

        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        assert_eq!(ServerConfig::new(addr).bind_addr, addr);
    }
}
