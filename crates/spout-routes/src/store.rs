//! Route persistence.
//!
//! This module provides:
//! - [`RouteStore`]: Trait for route persistence backends
//! - [`RouteFileStore`]: One JSON file per route in a directory
//! - [`MemoryRouteStore`]: Non-persistent store for tests and embedding

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RouteError, RouteResult};
use crate::types::Route;

/// Trait for route persistence backends.
///
/// Writes are synchronous: when `add` or `remove` returns, the change is
/// durable as far as the backend can make it.
pub trait RouteStore: Send + Sync {
    /// Reads every persisted route.
    ///
    /// # Errors
    ///
    /// Returns an error if any route cannot be read or decoded.
    fn get_all(&self) -> RouteResult<Vec<Route>>;

    /// Persists a route, replacing any route with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the route cannot be written.
    fn add(&self, route: &Route) -> RouteResult<()>;

    /// Deletes a persisted route. Removing an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the route exists but cannot be deleted.
    fn remove(&self, id: &str) -> RouteResult<()>;
}

/// Stores each route as `<id>.json` in a directory.
#[derive(Debug, Clone)]
pub struct RouteFileStore {
    dir: PathBuf,
}

impl RouteFileStore {
    /// Creates a store over an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not a directory.
    pub fn open(dir: impl Into<PathBuf>) -> RouteResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(RouteError::Persistence(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Directory holding the route files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> RouteResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(RouteError::Persistence(format!("invalid route id: {id:?}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl RouteStore for RouteFileStore {
    fn get_all(&self) -> RouteResult<Vec<Route>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
        paths.sort();

        let mut routes = Vec::with_capacity(paths.len());
        for path in paths {
            let data = fs::read(&path)?;
            let route: Route = serde_json::from_slice(&data).map_err(|e| {
                RouteError::Persistence(format!("corrupt route file {}: {e}", path.display()))
            })?;
            routes.push(route);
        }
        debug!(count = routes.len(), dir = %self.dir.display(), "read persisted routes");
        Ok(routes)
    }

    fn add(&self, route: &Route) -> RouteResult<()> {
        let path = self.path_for(&route.id)?;
        let data = serde_json::to_vec_pretty(route)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, id: &str) -> RouteResult<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps routes in memory only.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    routes: Mutex<BTreeMap<String, Route>>,
}

impl MemoryRouteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RouteStore for MemoryRouteStore {
    fn get_all(&self) -> RouteResult<Vec<Route>> {
        Ok(self.routes.lock().values().cloned().collect())
    }

    fn add(&self, route: &Route) -> RouteResult<()> {
        self.routes.lock().insert(route.id.clone(), route.clone());
        Ok(())
    }

    fn remove(&self, id: &str) -> RouteResult<()> {
        self.routes.lock().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RouteSource, Target};

    fn route(id: &str) -> Route {
        Route::new(Target::new("udp", "127.0.0.1:5000"))
            .with_id(id)
            .with_source(RouteSource {
                name: "web-1".to_string(),
                ..Default::default()
            })
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RouteFileStore::open(dir.path()).expect("open");

        store.add(&route("aaaaaaaaaaaa")).expect("add");
        store.add(&route("bbbbbbbbbbbb")).expect("add");
        assert!(dir.path().join("aaaaaaaaaaaa.json").is_file());

        let routes = store.get_all().expect("get_all");
        assert_eq!(routes, vec![route("aaaaaaaaaaaa"), route("bbbbbbbbbbbb")]);

        store.remove("aaaaaaaaaaaa").expect("remove");
        store.remove("aaaaaaaaaaaa").expect("remove twice");
        assert_eq!(store.get_all().expect("get_all").len(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        RouteFileStore::open(dir.path())
            .expect("open")
            .add(&route("cccccccccccc"))
            .expect("add");

        let reopened = RouteFileStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.get_all().expect("get_all"), vec![route("cccccccccccc")]);
    }

    #[test]
    fn corrupt_file_fails_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RouteFileStore::open(dir.path()).expect("open");
        store.add(&route("aaaaaaaaaaaa")).expect("add");
        fs::write(dir.path().join("broken.json"), b"{not json").expect("write");

        let result = store.get_all();
        assert!(matches!(result, Err(RouteError::Persistence(_))));
    }

    #[test]
    fn non_json_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("README"), b"notes").expect("write");
        let store = RouteFileStore::open(dir.path()).expect("open");
        assert!(store.get_all().expect("get_all").is_empty());
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = RouteFileStore::open(dir.path().join("missing"));
        assert!(matches!(result, Err(RouteError::Persistence(_))));
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RouteFileStore::open(dir.path()).expect("open");
        assert!(store.add(&route("../escape")).is_err());
        assert!(store.remove("").is_err());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryRouteStore::new();
        store.add(&route("aaaaaaaaaaaa")).expect("add");
        assert_eq!(store.get_all().expect("get_all").len(), 1);
        store.remove("aaaaaaaaaaaa").expect("remove");
        assert!(store.get_all().expect("get_all").is_empty());
    }
}
