//! Sink adapters.
//!
//! A route's target type selects one adapter when the route is
//! instantiated:
//!
//! | type            | adapter                  |
//! |-----------------|--------------------------|
//! | `syslog`        | [`SyslogAdapter`]        |
//! | `udp`           | [`UdpAdapter`]           |
//! | `elasticsearch` | [`ElasticsearchAdapter`] |

pub mod elasticsearch;
pub mod syslog;
pub mod udp;

use std::fmt;
use std::str::FromStr;

use spout_logs::LogRecord;

pub use elasticsearch::{BulkConfig, ElasticsearchAdapter};
pub use syslog::SyslogAdapter;
pub use udp::UdpAdapter;

use crate::error::{RouteError, RouteResult};
use crate::types::Target;

/// Supported target types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// RFC 3164-style syslog over UDP.
    Syslog,
    /// JSON lines over UDP.
    Udp,
    /// Elasticsearch bulk indexing.
    Elasticsearch,
}

impl AdapterKind {
    /// Type name used in route targets.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Syslog => "syslog",
            Self::Udp => "udp",
            Self::Elasticsearch => "elasticsearch",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syslog" => Ok(Self::Syslog),
            "udp" => Ok(Self::Udp),
            "elasticsearch" => Ok(Self::Elasticsearch),
            other => Err(RouteError::UnknownTargetType(other.to_string())),
        }
    }
}

/// A connected sink.
#[derive(Debug)]
pub enum Adapter {
    /// Syslog sink.
    Syslog(SyslogAdapter),
    /// UDP/JSON sink.
    Udp(UdpAdapter),
    /// Bulk indexing sink.
    Elasticsearch(ElasticsearchAdapter),
}

impl Adapter {
    /// Builds the adapter for a target.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownTargetType`] for unsupported types and
    /// [`RouteError::InvalidTarget`] for unusable addresses.
    pub async fn connect(target: &Target, bulk: &BulkConfig) -> RouteResult<Self> {
        match target.kind.parse::<AdapterKind>()? {
            AdapterKind::Syslog => Ok(Self::Syslog(SyslogAdapter::new(target)?)),
            AdapterKind::Udp => Ok(Self::Udp(UdpAdapter::connect(target).await?)),
            AdapterKind::Elasticsearch => Ok(Self::Elasticsearch(ElasticsearchAdapter::start(
                target,
                bulk.clone(),
            )?)),
        }
    }

    /// Which kind of sink this is.
    #[must_use]
    pub const fn kind(&self) -> AdapterKind {
        match self {
            Self::Syslog(_) => AdapterKind::Syslog,
            Self::Udp(_) => AdapterKind::Udp,
            Self::Elasticsearch(_) => AdapterKind::Elasticsearch,
        }
    }

    /// Forwards one record. Sink failures are handled by the adapter.
    pub async fn forward(&mut self, record: &LogRecord) {
        match self {
            Self::Syslog(adapter) => adapter.forward(record).await,
            Self::Udp(adapter) => adapter.forward(record).await,
            Self::Elasticsearch(adapter) => adapter.forward(record),
        }
    }

    /// Releases the sink, flushing anything it still buffers.
    pub async fn close(self) {
        if let Self::Elasticsearch(adapter) = self {
            adapter.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("syslog", AdapterKind::Syslog ; "syslog")]
    #[test_case("udp", AdapterKind::Udp ; "udp")]
    #[test_case("elasticsearch", AdapterKind::Elasticsearch ; "elasticsearch")]
    fn known_kinds_parse(name: &str, expected: AdapterKind) {
        let kind: AdapterKind = name.parse().unwrap();
        assert_eq!(kind, expected);
        assert_eq!(kind.to_string(), name);
    }

    #[test_case("kafka" ; "unsupported")]
    #[test_case("UDP" ; "case sensitive")]
    #[test_case("" ; "empty")]
    fn unknown_kinds_fail(name: &str) {
        assert!(matches!(
            name.parse::<AdapterKind>(),
            Err(RouteError::UnknownTargetType(_))
        ));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_type() {
        let result = Adapter::connect(&Target::new("kafka", "k:9092"), &BulkConfig::default()).await;
        assert!(matches!(result, Err(RouteError::UnknownTargetType(_))));
    }

    #[tokio::test]
    async fn connect_builds_matching_adapter() {
        let adapter = Adapter::connect(&Target::new("udp", "127.0.0.1:9"), &BulkConfig::default())
            .await
            .unwrap();
        assert_eq!(adapter.kind(), AdapterKind::Udp);
        adapter.close().await;
    }
}
