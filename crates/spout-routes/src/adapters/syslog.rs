//! Syslog forwarding over UDP.
//!
//! Each record is sent as one datagram:
//! `<14>{timestamp} {hostname} {tag}[{pid}]: {data}\n`, where priority 14 is
//! facility user with severity info and the tag is the container name plus
//! the target's append tag.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use spout_logs::LogRecord;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::adapters::udp::connect_udp;
use crate::error::{RouteError, RouteResult};
use crate::types::Target;

/// Facility `user` (1) times 8 plus severity `info` (6).
pub const PRIORITY_USER_INFO: u8 = 14;

/// Forwards records to a syslog daemon.
///
/// Sockets are opened lazily and cached per tag. A failed open or send is
/// logged, the cached socket is dropped, and the record is skipped.
#[derive(Debug)]
pub struct SyslogAdapter {
    target: Target,
    hostname: String,
    pid: u32,
    sockets: HashMap<String, UdpSocket>,
}

impl SyslogAdapter {
    /// Creates an adapter for a `host:port` target.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTarget`] if the address is empty.
    pub fn new(target: &Target) -> RouteResult<Self> {
        if target.addr.trim().is_empty() {
            return Err(RouteError::InvalidTarget("syslog target needs an address".to_string()));
        }
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Ok(Self {
            target: target.clone(),
            hostname,
            pid: std::process::id(),
            sockets: HashMap::new(),
        })
    }

    /// Sends one record.
    pub async fn forward(&mut self, record: &LogRecord) {
        let tag = self.target.tag_for(&record.name);
        let message = format_message(&self.hostname, &tag, self.pid, Utc::now(), &record.data);

        if !self.sockets.contains_key(&tag) {
            match connect_udp(&self.target.addr).await {
                Ok(socket) => {
                    self.sockets.insert(tag.clone(), socket);
                }
                Err(e) => {
                    warn!(addr = %self.target.addr, tag = %tag, error = %e, "syslog connect failed");
                    return;
                }
            }
        }

        let Some(socket) = self.sockets.get(&tag) else {
            return;
        };
        if let Err(e) = socket.send(message.as_bytes()).await {
            warn!(addr = %self.target.addr, tag = %tag, error = %e, "syslog send failed");
            self.sockets.remove(&tag);
        }
    }
}

/// Formats one syslog datagram.
#[must_use]
pub fn format_message(
    hostname: &str,
    tag: &str,
    pid: u32,
    timestamp: DateTime<Utc>,
    data: &str,
) -> String {
    let newline = if data.ends_with('\n') { "" } else { "\n" };
    format!(
        "<{PRIORITY_USER_INFO}>{} {hostname} {tag}[{pid}]: {data}{newline}",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
