//! Docker runtime implementation using bollard.

use std::collections::HashMap;

use bollard::container::{
    AttachContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
};
use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures::StreamExt;
use spout_logs::{ContainerInfo, StreamType};
use tracing::debug;

use crate::error::{AttachError, AttachResult};
use crate::runtime::{
    ContainerRuntime, EventStream, OutputChunk, OutputStream, RuntimeEvent, RuntimeFuture,
};

/// Default Docker endpoint.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Request timeout in seconds for non-streaming calls.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Docker container runtime.
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the Docker daemon using the default connection method.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub fn connect() -> AttachResult<Self> {
        let client = Docker::connect_with_local_defaults().map_err(|e| {
            AttachError::ConnectionFailed(format!("failed to connect to Docker: {e}"))
        })?;
        Ok(Self { client })
    }

    /// Connect to the Docker daemon at an endpoint such as
    /// `unix:///var/run/docker.sock` or `tcp://10.0.0.2:2375`.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is malformed or connection fails.
    pub fn connect_to(endpoint: &str) -> AttachResult<Self> {
        let client = if let Some(path) = endpoint.strip_prefix("unix://") {
            Docker::connect_with_unix(path, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            Docker::connect_with_http(
                &format!("http://{addr}"),
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        } else if endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        } else {
            return Err(AttachError::ConnectionFailed(format!(
                "unsupported Docker endpoint: {endpoint}"
            )));
        }
        .map_err(|e| {
            AttachError::ConnectionFailed(format!("failed to connect to Docker at {endpoint}: {e}"))
        })?;

        Ok(Self { client })
    }

    /// Maps a Docker event to a lifecycle notification, if it is one we track.
    fn convert_event(message: EventMessage) -> Option<RuntimeEvent> {
        if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
            return None;
        }
        let id = message.actor.and_then(|actor| actor.id)?;
        match message.action.as_deref() {
            Some("start") => Some(RuntimeEvent::Started(id)),
            Some("die") => Some(RuntimeEvent::Died(id)),
            _ => None,
        }
    }

    /// Maps Docker's multiplexed output frames to chunks.
    fn convert_output(output: LogOutput) -> Option<OutputChunk> {
        match output {
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                Some(OutputChunk::new(StreamType::Stdout, message))
            }
            LogOutput::StdErr { message } => Some(OutputChunk::new(StreamType::Stderr, message)),
            LogOutput::StdIn { .. } => None,
        }
    }
}

impl ContainerRuntime for DockerRuntime {
    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>> {
        Box::pin(async move {
            let options = ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            };

            let containers = self
                .client
                .list_containers(Some(options))
                .await
                .map_err(|e| AttachError::Runtime(e.to_string()))?;

            Ok(containers
                .into_iter()
                .filter_map(|c| {
                    let id = c.id?;
                    let name = c
                        .names
                        .and_then(|names| names.into_iter().next())
                        .unwrap_or_default();
                    Some(ContainerInfo::new(id, name, c.image.unwrap_or_default()))
                })
                .collect())
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ContainerInfo> {
        Box::pin(async move {
            let response = self
                .client
                .inspect_container(id, None::<InspectContainerOptions>)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError {
                        status_code: 404, ..
                    } => AttachError::NotFound(id.to_string()),
                    other => AttachError::Runtime(other.to_string()),
                })?;

            let image = response
                .config
                .and_then(|config| config.image)
                .unwrap_or_default();

            Ok(ContainerInfo::new(
                response.id.unwrap_or_else(|| id.to_string()),
                response.name.unwrap_or_default(),
                image,
            ))
        })
    }

    fn events(&self) -> RuntimeFuture<'_, EventStream> {
        Box::pin(async move {
            let mut filters = HashMap::new();
            filters.insert("type".to_string(), vec!["container".to_string()]);
            filters.insert(
                "event".to_string(),
                vec!["start".to_string(), "die".to_string()],
            );

            let options = EventsOptions::<String> {
                filters,
                ..Default::default()
            };

            let stream = self
                .client
                .events(Some(options))
                .filter_map(|result| async move {
                    match result {
                        Ok(message) => Self::convert_event(message).map(Ok),
                        Err(e) => Some(Err(AttachError::Runtime(e.to_string()))),
                    }
                });

            let events: EventStream = Box::pin(stream);
            Ok(events)
        })
    }

    fn attach<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, OutputStream> {
        Box::pin(async move {
            let options = AttachContainerOptions::<String> {
                stdout: Some(true),
                stderr: Some(true),
                stream: Some(true),
                logs: Some(false),
                ..Default::default()
            };

            let results = self
                .client
                .attach_container(id, Some(options))
                .await
                .map_err(|e| AttachError::Runtime(format!("attach {id} failed: {e}")))?;

            debug!(id = %id, "attached to container output");

            let stream = results.output.filter_map(|result| async move {
                match result {
                    Ok(output) => Self::convert_output(output).map(Ok),
                    Err(e) => Some(Err(AttachError::Runtime(e.to_string()))),
                }
            });

            let output: OutputStream = Box::pin(stream);
            Ok(output)
        })
    }
}
