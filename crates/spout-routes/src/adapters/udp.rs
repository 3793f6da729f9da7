//! Newline-terminated JSON over UDP, one record per datagram.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use spout_logs::LogRecord;
use tokio::net::{UdpSocket, lookup_host};
use tracing::trace;

use crate::error::{RouteError, RouteResult};
use crate::types::Target;

/// Sends each record as a JSON datagram over one socket held for the
/// route's lifetime. Encode and send errors are dropped.
#[derive(Debug)]
pub struct UdpAdapter {
    socket: UdpSocket,
}

impl UdpAdapter {
    /// Opens a socket connected to the target address.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTarget`] if the address cannot be
    /// resolved or connected.
    pub async fn connect(target: &Target) -> RouteResult<Self> {
        let socket = connect_udp(&target.addr).await.map_err(|e| {
            RouteError::InvalidTarget(format!("udp target {:?}: {e}", target.addr))
        })?;
        Ok(Self { socket })
    }

    /// Sends one record.
    pub async fn forward(&self, record: &LogRecord) {
        let Ok(mut payload) = serde_json::to_vec(record) else {
            return;
        };
        payload.push(b'\n');
        if let Err(e) = self.socket.send(&payload).await {
            trace!(error = %e, "udp send dropped");
        }
    }
}

/// Resolves `addr` and connects a socket bound to the matching address
/// family, trying each resolved address in turn.
pub(crate) async fn connect_udp(addr: &str) -> io::Result<UdpSocket> {
    let mut last_err = None;
    for remote in lookup_host(addr).await? {
        let local: SocketAddr = if remote.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let attempt = async {
            let socket = UdpSocket::bind(local).await?;
            socket.connect(remote).await?;
            Ok::<_, io::Error>(socket)
        };
        match attempt.await {
            Ok(socket) => return Ok(socket),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spout_logs::{ContainerInfo, StreamType};
    use std::time::Duration;

    #[tokio::test]
    async fn sends_json_line() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = Target::new("udp", server.local_addr().unwrap().to_string());
        let adapter = UdpAdapter::connect(&target).await.unwrap();

        let db = ContainerInfo::new("cccccccccccc3333", "db-1", "postgres:16");
        adapter
            .forward(&LogRecord::new(&db, StreamType::Stderr, "checkpoint"))
            .await;

        let mut buf = [0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(2), server.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf[n - 1], b'\n');
        let json: serde_json::Value = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "db-1",
                "id": "cccccccccccc3333",
                "image": "postgres:16",
                "type": "stderr",
                "data": "checkpoint"
            })
        );
    }

    #[tokio::test]
    async fn sends_to_ipv6_target() {
        // hosts without an IPv6 loopback cannot run this
        let Ok(server) = UdpSocket::bind("[::1]:0").await else {
            return;
        };
        let target = Target::new("udp", server.local_addr().unwrap().to_string());
        let adapter = UdpAdapter::connect(&target).await.unwrap();

        let web = ContainerInfo::new("aaaaaaaaaaaa1111", "web-1", "nginx");
        adapter
            .forward(&LogRecord::new(&web, StreamType::Stdout, "over v6"))
            .await;

        let mut buf = [0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(2), server.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(json["data"], "over v6");
    }

    #[tokio::test]
    async fn bad_address_is_invalid_target() {
        let result = UdpAdapter::connect(&Target::new("udp", "not an address")).await;
        assert!(matches!(result, Err(RouteError::InvalidTarget(_))));
    }
}
