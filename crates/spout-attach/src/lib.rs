//! Container attachment and log fan-out.
//!
//! This crate keeps a consistent view of which containers are running,
//! runs one reader per attached container, and delivers every line to the
//! listeners whose [`Source`](spout_logs::Source) selects that container.
//!
//! # Components
//!
//! - [`ContainerRuntime`]: the runtime capability (list, inspect, events, attach)
//! - [`DockerRuntime`]: bollard-backed implementation
//! - [`MemoryRuntime`]: in-process implementation for tests and embedding
//! - [`AttachManager`]: backfill, lifecycle events, readers and fan-out
//! - [`Subscription`]: a live listener registration
//!
//! # Delivery
//!
//! Each listener owns a bounded channel. A reader hands a record to every
//! listener with room immediately and waits at most
//! [`AttachConfig::delivery_timeout`] for full ones; a listener that stays
//! full is evicted and its channel closed, so a stalled consumer never holds
//! up the others.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use spout_attach::{AttachConfig, AttachManager, DockerRuntime};
//! use spout_logs::Source;
//! use tokio::sync::mpsc;
//!
//! let runtime = Arc::new(DockerRuntime::connect()?);
//! let manager = AttachManager::start(runtime, AttachConfig::default()).await?;
//!
//! let (tx, mut rx) = mpsc::channel(256);
//! let _subscription = manager.subscribe(Source::filter("web"), tx)?;
//! while let Some(record) = rx.recv().await {
//!     println!("{}: {}", record.name, record.data);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod docker;
pub mod error;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod runtime;

pub use config::AttachConfig;
pub use docker::{DockerRuntime, DEFAULT_DOCKER_HOST};
pub use error::{AttachError, AttachResult};
pub use manager::{AttachManager, Subscription};
pub use memory::MemoryRuntime;
pub use registry::{ListenerId, RecordSender};
pub use runtime::{
    ContainerRuntime, EventStream, OutputChunk, OutputStream, RuntimeEvent, RuntimeFuture,
};
