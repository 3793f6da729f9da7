//! Route definitions.

use serde::{Deserialize, Serialize};
use spout_logs::{Source, StreamType, TypeFilter};

/// Length of generated route ids.
pub const ROUTE_ID_LEN: usize = 12;

/// A persisted sink descriptor.
///
/// Serializes as
/// `{"id", "source": {"id", "name", "filter", "types"}, "target": {"type", "addr", "append_tag"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Unique id, stable across restarts. Assigned on add when empty.
    #[serde(default)]
    pub id: String,
    /// Container and stream constraints. Absent means everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RouteSource>,
    /// Where records go.
    pub target: Target,
}

impl Route {
    /// Creates a route with no id and no constraints.
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            id: String::new(),
            source: None,
            target,
        }
    }

    /// Sets the route id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the source constraints.
    #[must_use]
    pub fn with_source(mut self, source: RouteSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Generates an id if the route has none.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = generate_id();
        }
    }

    /// Container selector for this route.
    #[must_use]
    pub fn selector(&self) -> Source {
        self.source
            .as_ref()
            .map_or(Source::All, RouteSource::selector)
    }

    /// Stream types accepted by this route.
    #[must_use]
    pub fn type_filter(&self) -> TypeFilter {
        self.source
            .as_ref()
            .map(|source| source.types.clone())
            .unwrap_or_default()
    }

    /// Returns true if records from `stream` should be forwarded.
    #[must_use]
    pub fn accepts(&self, stream: StreamType) -> bool {
        self.source
            .as_ref()
            .is_none_or(|source| source.types.accepts(stream))
    }
}

/// Constraints on which records a route receives.
///
/// At most one of `id`, `name` and `filter` is meaningful; when several are
/// set, id wins over name and name over filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSource {
    /// Container id or id prefix.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Exact container name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Container name filter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter: String,
    /// Accepted stream types; empty accepts both.
    #[serde(default, skip_serializing_if = "TypeFilter::is_empty")]
    pub types: TypeFilter,
}

impl RouteSource {
    /// Builds the container selector.
    #[must_use]
    pub fn selector(&self) -> Source {
        if !self.id.is_empty() {
            Source::id(&self.id)
        } else if !self.name.is_empty() {
            Source::name(&self.name)
        } else {
            Source::filter(&self.filter)
        }
    }
}

/// Sink address of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Adapter type, e.g. `syslog`, `udp` or `elasticsearch`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sink address, normally `host:port`.
    #[serde(default)]
    pub addr: String,
    /// Suffix appended to the container name when tagging records.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub append_tag: String,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(kind: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            addr: addr.into(),
            append_tag: String::new(),
        }
    }

    /// Sets the tag suffix.
    #[must_use]
    pub fn with_append_tag(mut self, tag: impl Into<String>) -> Self {
        self.append_tag = tag.into();
        self
    }

    /// Tag for records of the named container.
    #[must_use]
    pub fn tag_for(&self, name: &str) -> String {
        format!("{name}{}", self.append_tag)
    }
}

/// Generates a fresh route id of [`ROUTE_ID_LEN`] lowercase hex characters.
#[must_use]
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ROUTE_ID_LEN);
    id
}
