//! In-process container runtime.
//!
//! [`MemoryRuntime`] behaves like a container runtime whose containers and
//! output are driven by method calls. It backs the tests of every crate that
//! sits on top of the attach manager and needs no Docker daemon.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use spout_logs::{ContainerInfo, StreamType};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{AttachError, AttachResult};
use crate::runtime::{
    ContainerRuntime, EventStream, OutputChunk, OutputStream, RuntimeEvent, RuntimeFuture,
};

type ChunkSender = mpsc::UnboundedSender<AttachResult<OutputChunk>>;
type EventSender = mpsc::UnboundedSender<AttachResult<RuntimeEvent>>;

#[derive(Default)]
struct MemoryState {
    running: HashMap<String, ContainerInfo>,
    outputs: HashMap<String, Vec<ChunkSender>>,
    subscribers: Vec<EventSender>,
}

impl MemoryState {
    fn emit(&mut self, event: &RuntimeEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(Ok(event.clone())).is_ok());
    }
}

/// Container runtime driven entirely in memory.
#[derive(Default)]
pub struct MemoryRuntime {
    state: Mutex<MemoryState>,
}

impl MemoryRuntime {
    /// Creates a runtime with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a container as running and announces its start.
    pub fn start_container(&self, info: ContainerInfo) {
        let mut state = self.state.lock();
        let event = RuntimeEvent::Started(info.id.clone());
        state.running.insert(info.id.clone(), info);
        state.emit(&event);
    }

    /// Marks a container as running without announcing it, as if it was
    /// already running before anyone subscribed to events.
    pub fn seed_container(&self, info: ContainerInfo) {
        self.state.lock().running.insert(info.id.clone(), info);
    }

    /// Stops a container: closes its output streams and announces its death.
    pub fn stop_container(&self, id: &str) {
        let mut state = self.state.lock();
        state.running.remove(id);
        state.outputs.remove(id);
        state.emit(&RuntimeEvent::Died(id.to_string()));
    }

    /// Announces a container's death but leaves its output streams open, like
    /// a runtime whose attach stream lags behind its events.
    pub fn announce_death(&self, id: &str) {
        let mut state = self.state.lock();
        state.running.remove(id);
        state.emit(&RuntimeEvent::Died(id.to_string()));
    }

    /// Closes a container's output streams without stopping it.
    pub fn close_output(&self, id: &str) {
        self.state.lock().outputs.remove(id);
    }

    /// Writes raw output to every attached stream of a container.
    pub fn write(&self, id: &str, stream: StreamType, data: impl Into<Bytes>) {
        let chunk = OutputChunk::new(stream, data);
        let mut state = self.state.lock();
        if let Some(outputs) = state.outputs.get_mut(id) {
            outputs.retain(|output| output.send(Ok(chunk.clone())).is_ok());
        }
    }

    /// Fails every attached stream of a container with a read error.
    pub fn fail_output(&self, id: &str, message: &str) {
        let mut state = self.state.lock();
        if let Some(outputs) = state.outputs.remove(id) {
            for output in outputs {
                let _ = output.send(Err(AttachError::Runtime(message.to_string())));
            }
        }
    }

    /// Number of open output streams for a container.
    #[must_use]
    pub fn attach_count(&self, id: &str) -> usize {
        self.state
            .lock()
            .outputs
            .get(id)
            .map_or(0, |outputs| outputs.iter().filter(|o| !o.is_closed()).count())
    }
}

impl ContainerRuntime for MemoryRuntime {
    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>> {
        Box::pin(async move { Ok(self.state.lock().running.values().cloned().collect()) })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ContainerInfo> {
        Box::pin(async move {
            self.state
                .lock()
                .running
                .get(id)
                .cloned()
                .ok_or_else(|| AttachError::NotFound(id.to_string()))
        })
    }

    fn events(&self) -> RuntimeFuture<'_, EventStream> {
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            self.state.lock().subscribers.push(tx);
            let events: EventStream = Box::pin(UnboundedReceiverStream::new(rx));
            Ok(events)
        })
    }

    fn attach<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, OutputStream> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if !state.running.contains_key(id) {
                return Err(AttachError::NotFound(id.to_string()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.outputs.entry(id.to_string()).or_default().push(tx);
            let output: OutputStream = Box::pin(UnboundedReceiverStream::new(rx));
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn info(id: &str, name: &str) -> ContainerInfo {
        ContainerInfo::new(id, name, "busybox")
    }

    #[tokio::test]
    async fn events_announce_start_and_stop() {
        let runtime = MemoryRuntime::new();
        let mut events = runtime.events().await.unwrap();

        runtime.start_container(info("aaa", "web"));
        runtime.stop_container("aaa");

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RuntimeEvent::Started("aaa".to_string())
        );
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RuntimeEvent::Died("aaa".to_string())
        );
    }

    #[tokio::test]
    async fn seeded_containers_are_listed_silently() {
        let runtime = MemoryRuntime::new();
        runtime.seed_container(info("aaa", "web"));

        let running = runtime.list_running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(runtime.inspect("aaa").await.unwrap().name, "web");
        assert!(runtime.inspect("bbb").await.is_err());
    }

    #[tokio::test]
    async fn attached_stream_receives_writes_until_stop() {
        let runtime = MemoryRuntime::new();
        runtime.start_container(info("aaa", "web"));

        let mut output = runtime.attach("aaa").await.unwrap();
        assert_eq!(runtime.attach_count("aaa"), 1);

        runtime.write("aaa", StreamType::Stderr, "boom\n");
        let chunk = output.next().await.unwrap().unwrap();
        assert_eq!(chunk.stream, StreamType::Stderr);
        assert_eq!(chunk.bytes, Bytes::from_static(b"boom\n"));

        runtime.stop_container("aaa");
        assert!(output.next().await.is_none());
    }

    #[tokio::test]
    async fn attach_to_stopped_container_fails() {
        let runtime = MemoryRuntime::new();
        assert!(matches!(
            runtime.attach("nope").await,
            Err(AttachError::NotFound(_))
        ));
    }
}
