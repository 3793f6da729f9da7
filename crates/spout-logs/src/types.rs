//! Core types for records flowing through the router.
//!
//! This module provides:
//! - [`StreamType`]: stdout or stderr
//! - [`ContainerInfo`]: Identity of a running container
//! - [`LogRecord`]: One unit of container output
//! - [`TypeFilter`]: Accepted stream types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LogsError, Result};

/// Length of the short form of a container id.
pub const SHORT_ID_LEN: usize = 12;

/// Returns the short form of a container id (its first 12 characters).
#[must_use]
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Output stream a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl StreamType {
    /// Returns the wire name of this stream type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = LogsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(LogsError::InvalidStreamType(other.to_string())),
        }
    }
}

/// Identity of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Full container id
    pub id: String,
    /// Container name without the runtime's leading `/`
    pub name: String,
    /// Image reference the container was started from
    pub image: String,
}

impl ContainerInfo {
    /// Creates container info, stripping the leading `/` Docker puts on names.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl AsRef<str>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.as_ref().trim_start_matches('/').to_string(),
            image: image.into(),
        }
    }

    /// Returns the 12 character short id.
    #[must_use]
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// One unit (normally a line) of container output.
///
/// Serializes to the wire shape `{name, id, image, type, data}` used by the
/// UDP sink, JSON streaming clients and websocket frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Container name
    pub name: String,
    /// Full container id
    pub id: String,
    /// Container image
    pub image: String,
    /// Stream the payload came from
    #[serde(rename = "type")]
    pub stream: StreamType,
    /// Raw payload without the trailing newline
    pub data: String,
}

impl LogRecord {
    /// Creates a record for the given container.
    #[must_use]
    pub fn new(container: &ContainerInfo, stream: StreamType, data: impl Into<String>) -> Self {
        Self {
            name: container.name.clone(),
            id: container.id.clone(),
            image: container.image.clone(),
            stream,
            data: data.into(),
        }
    }
}

/// Set of accepted stream types. An empty filter accepts both streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeFilter(Vec<StreamType>);

impl TypeFilter {
    /// A filter accepting every stream type.
    #[must_use]
    pub const fn all() -> Self {
        Self(Vec::new())
    }

    /// A filter accepting only the given stream types.
    #[must_use]
    pub fn only(types: impl IntoIterator<Item = StreamType>) -> Self {
        let mut accepted = Vec::new();
        for stream in types {
            if !accepted.contains(&stream) {
                accepted.push(stream);
            }
        }
        Self(accepted)
    }

    /// Parses a comma separated list such as `stdout,stderr`.
    ///
    /// Blank items are ignored, so an empty string accepts everything.
    pub fn parse_list(list: &str) -> Result<Self> {
        let types = list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(StreamType::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::only(types))
    }

    /// Returns true if records from `stream` pass this filter.
    #[must_use]
    pub fn accepts(&self, stream: StreamType) -> bool {
        self.0.is_empty() || self.0.contains(&stream)
    }

    /// Returns true if no restriction is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The explicitly accepted stream types.
    #[must_use]
    pub fn types(&self) -> &[StreamType] {
        &self.0
    }
}
