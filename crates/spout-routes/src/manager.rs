//! Route registry and streamers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use spout_attach::AttachManager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{Adapter, BulkConfig};
use crate::error::{RouteError, RouteResult};
use crate::store::RouteStore;
use crate::types::Route;

/// A route with its running streamer.
struct ActiveRoute {
    route: Route,
    seq: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    attacher: AttachManager,
    bulk: BulkConfig,
    routes: Mutex<HashMap<String, ActiveRoute>>,
    store: Mutex<Option<Arc<dyn RouteStore>>>,
    // Serializes add/remove/load so the store and the map change together.
    ops: tokio::sync::Mutex<()>,
    next_seq: AtomicU64,
}

/// Keeps the set of routes, their persisted copies and their streamers in
/// step.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct RouteManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RouteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteManager")
            .field("routes", &self.inner.routes.lock().len())
            .finish_non_exhaustive()
    }
}

impl RouteManager {
    /// Creates a manager with no routes and no persistence.
    #[must_use]
    pub fn new(attacher: AttachManager) -> Self {
        Self::with_bulk_config(attacher, BulkConfig::default())
    }

    /// Creates a manager whose indexing routes use `bulk`.
    #[must_use]
    pub fn with_bulk_config(attacher: AttachManager, bulk: BulkConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                attacher,
                bulk,
                routes: Mutex::new(HashMap::new()),
                store: Mutex::new(None),
                ops: tokio::sync::Mutex::new(()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Adds a route, assigning an id if it has none, persisting it and
    /// starting its streamer. A route with the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownTargetType`] or
    /// [`RouteError::InvalidTarget`] if no sink can be built, or a
    /// persistence error if the route cannot be stored. Nothing changes on
    /// error.
    pub async fn add(&self, mut route: Route) -> RouteResult<Route> {
        let _op = self.inner.ops.lock().await;
        route.ensure_id();

        let adapter = Adapter::connect(&route.target, &self.inner.bulk).await?;

        let store = self.inner.store.lock().clone();
        if let Some(store) = store {
            if let Err(e) = store.add(&route) {
                adapter.close().await;
                return Err(e);
            }
        }

        if let Some(previous) = self.inner.routes.lock().remove(&route.id) {
            previous.cancel.cancel();
        }
        self.activate(route.clone(), adapter);
        info!(route = %route.id, target = %route.target.kind, addr = %route.target.addr, "route added");
        Ok(route)
    }

    /// Returns the route with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Route> {
        self.inner
            .routes
            .lock()
            .get(id)
            .map(|active| active.route.clone())
    }

    /// All routes in the order they were added.
    #[must_use]
    pub fn get_all(&self) -> Vec<Route> {
        let routes = self.inner.routes.lock();
        let mut active: Vec<&ActiveRoute> = routes.values().collect();
        active.sort_by_key(|a| a.seq);
        active.into_iter().map(|a| a.route.clone()).collect()
    }

    /// Number of active routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.routes.lock().len()
    }

    /// Returns true if there are no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes a route: stops its streamer and deletes its persisted copy.
    ///
    /// Returns whether the route existed. When this returns, the route's
    /// sink receives no further records.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the stored route cannot be deleted; the
    /// route keeps running in that case.
    pub async fn remove(&self, id: &str) -> RouteResult<bool> {
        let _op = self.inner.ops.lock().await;
        if !self.inner.routes.lock().contains_key(id) {
            return Ok(false);
        }

        let store = self.inner.store.lock().clone();
        if let Some(store) = store {
            store.remove(id)?;
        }

        let Some(active) = self.inner.routes.lock().remove(id) else {
            return Ok(false);
        };
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(route = %id, error = %e, "route streamer failed");
        }
        info!(route = %id, "route removed");
        Ok(true)
    }

    /// Starts every route in `store` and persists later changes there.
    ///
    /// Loaded routes are not written back. Routes added before loading stay
    /// in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or any stored route
    /// cannot be started; no stored route is started in that case.
    pub async fn load(&self, store: Arc<dyn RouteStore>) -> RouteResult<usize> {
        let _op = self.inner.ops.lock().await;
        let routes = store.get_all()?;

        let mut ready = Vec::with_capacity(routes.len());
        for route in routes {
            if route.id.is_empty() {
                return Err(RouteError::Persistence("stored route without id".to_string()));
            }
            match Adapter::connect(&route.target, &self.inner.bulk).await {
                Ok(adapter) => ready.push((route, adapter)),
                Err(e) => {
                    for (_, adapter) in ready {
                        adapter.close().await;
                    }
                    return Err(RouteError::Persistence(format!(
                        "cannot start stored route {}: {e}",
                        route.id
                    )));
                }
            }
        }

        let count = ready.len();
        for (route, adapter) in ready {
            if let Some(previous) = self.inner.routes.lock().remove(&route.id) {
                previous.cancel.cancel();
            }
            debug!(route = %route.id, target = %route.target.kind, "route loaded");
            self.activate(route, adapter);
        }
        *self.inner.store.lock() = Some(store);
        info!(routes = count, "loaded persisted routes");
        Ok(count)
    }

    /// Stops every streamer without touching the store.
    pub async fn shutdown(&self) {
        let _op = self.inner.ops.lock().await;
        let active: Vec<ActiveRoute> = self.inner.routes.lock().drain().map(|(_, a)| a).collect();
        for route in active {
            route.cancel.cancel();
            if let Err(e) = route.task.await {
                warn!(route = %route.route.id, error = %e, "route streamer failed");
            }
        }
    }

    fn activate(&self, route: Route, adapter: Adapter) {
        let cancel = CancellationToken::new();
        let streamer = Streamer {
            attacher: self.inner.attacher.clone(),
            route: route.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(streamer.run(adapter));
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.routes.lock().insert(
            route.id.clone(),
            ActiveRoute {
                route,
                seq,
                cancel,
                task,
            },
        );
    }
}

/// Drains one route's listener channel into its adapter.
struct Streamer {
    attacher: AttachManager,
    route: Route,
    cancel: CancellationToken,
}

impl Streamer {
    async fn run(self, mut adapter: Adapter) {
        let selector = self.route.selector();
        let buffer = self.attacher.config().listener_buffer;

        while !self.cancel.is_cancelled() && !self.attacher.is_shutdown() {
            let (tx, mut rx) = mpsc::channel(buffer);
            let subscription = self.attacher.follow(selector.clone(), tx);

            loop {
                let next = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break,
                    next = rx.recv() => next,
                };
                let Some(record) = next else {
                    break;
                };
                if self.route.accepts(record.stream) {
                    adapter.forward(&record).await;
                }
            }

            drop(subscription);
            if !self.cancel.is_cancelled() && !self.attacher.is_shutdown() {
                warn!(route = %self.route.id, "route listener was evicted, resubscribing");
            }
        }

        adapter.close().await;
        debug!(route = %self.route.id, "route streamer stopped");
    }
}
