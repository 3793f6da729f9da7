//! Container runtime capability used by the attach manager.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use spout_logs::{ContainerInfo, StreamType};

use crate::error::AttachResult;

/// Boxed future returned by runtime operations.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = AttachResult<T>> + Send + 'a>>;

/// Combined stdout/stderr output of one attached container.
pub type OutputStream = Pin<Box<dyn Stream<Item = AttachResult<OutputChunk>> + Send>>;

/// Container lifecycle notifications.
pub type EventStream = Pin<Box<dyn Stream<Item = AttachResult<RuntimeEvent>> + Send>>;

/// A raw chunk of container output tagged with its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Stream the bytes were written to.
    pub stream: StreamType,
    /// Raw bytes; may hold partial or multiple lines.
    pub bytes: Bytes,
}

impl OutputChunk {
    /// Creates a chunk.
    #[must_use]
    pub fn new(stream: StreamType, bytes: impl Into<Bytes>) -> Self {
        Self {
            stream,
            bytes: bytes.into(),
        }
    }
}

/// Lifecycle notification from the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A container started running.
    Started(String),
    /// A container stopped running.
    Died(String),
}

impl RuntimeEvent {
    /// The container id the event refers to.
    #[must_use]
    pub fn container_id(&self) -> &str {
        match self {
            Self::Started(id) | Self::Died(id) => id,
        }
    }
}

/// Container runtime operations needed to discover and attach to containers.
///
/// The trait is object-safe so the manager can hold any runtime behind
/// `Arc<dyn ContainerRuntime>`.
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Lists currently running containers.
    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>>;

    /// Looks up a single container.
    fn inspect<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ContainerInfo>;

    /// Subscribes to container start/die notifications.
    fn events(&self) -> RuntimeFuture<'_, EventStream>;

    /// Attaches to the live output of a running container.
    fn attach<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, OutputStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_container_id() {
        assert_eq!(RuntimeEvent::Started("abc".to_string()).container_id(), "abc");
        assert_eq!(RuntimeEvent::Died("def".to_string()).container_id(), "def");
    }

    #[test]
    fn runtime_is_object_safe() {
        fn takes_dyn(_: Option<&dyn ContainerRuntime>) {}
        takes_dyn(None);
    }
}
