//! # spout-routes
//!
//! Long-lived, persisted log routes.
//!
//! A [`Route`] names a sink ([`Target`]) and optionally restricts which
//! containers and streams feed it ([`RouteSource`]). The [`RouteManager`]
//! keeps routes in memory, mirrors every change into a [`RouteStore`], and
//! runs one streamer per route that drains a listener from the attach
//! manager into the route's [`Adapter`].
//!
//! ## Sinks
//!
//! - `syslog`: one datagram per record, tagged with the container name
//! - `udp`: newline-terminated JSON per datagram
//! - `elasticsearch`: batched `_bulk` indexing into daily `logstash-*` indices
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use spout_routes::{Route, RouteFileStore, RouteManager, Target};
//!
//! let routes = RouteManager::new(attacher);
//! routes.load(Arc::new(RouteFileStore::open("/var/lib/spout")?)).await?;
//! let route = routes.add(Route::new(Target::new("udp", "10.0.0.5:5000"))).await?;
//! println!("added {}", route.id);
//! ```

#![forbid(unsafe_code)]

pub mod adapters;
pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use adapters::{Adapter, AdapterKind, BulkConfig};
pub use error::{RouteError, RouteResult};
pub use manager::RouteManager;
pub use store::{MemoryRouteStore, RouteFileStore, RouteStore};
pub use types::{generate_id, Route, RouteSource, Target, ROUTE_ID_LEN};
