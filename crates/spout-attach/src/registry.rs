//! Live container set and listener registry.
//!
//! The registry is plain data guarded by the manager's lock. Every mutation
//! (attach, detach, add listener, remove listener) happens under that lock so
//! a container dying and a listener subscribing can never interleave.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use spout_logs::{short_id, ContainerInfo, LogRecord, Source};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AttachError, AttachResult};

/// Identifies one registered listener.
pub type ListenerId = u64;

/// Write side of a listener channel. The manager is its only writer.
pub type RecordSender = mpsc::Sender<Arc<LogRecord>>;

/// A container with a running reader.
#[derive(Debug)]
struct Attached {
    info: ContainerInfo,
    epoch: u64,
    listeners: BTreeSet<ListenerId>,
    stop: CancellationToken,
    /// The runtime reported the container dead; its reader is draining.
    dying: bool,
}

/// A registered consumer.
#[derive(Debug)]
struct Listener {
    source: Source,
    sender: RecordSender,
    done: CancellationToken,
    follow: bool,
    containers: HashSet<String>,
}

/// Bookkeeping for attached containers and their listeners.
#[derive(Debug, Default)]
pub struct Registry {
    containers: HashMap<String, Attached>,
    listeners: HashMap<ListenerId, Listener>,
    next_listener: ListenerId,
    next_epoch: u64,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly attached container and joins every listener whose
    /// source selects it.
    ///
    /// Returns the attachment epoch and the reader's stop token, or `None`
    /// if the container is already attached. An attachment that is still
    /// draining after its container died is replaced.
    pub fn attach(
        &mut self,
        info: ContainerInfo,
        parent: &CancellationToken,
    ) -> Option<(u64, CancellationToken)> {
        match self.containers.get(&info.id) {
            Some(old) if old.dying => {
                let epoch = old.epoch;
                self.detach(&info.id, Some(epoch));
            }
            Some(_) => return None,
            None => {}
        }

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let stop = parent.child_token();

        let mut joined = BTreeSet::new();
        for (&listener_id, listener) in &mut self.listeners {
            if listener.source.matches(&info.id, &info.name) {
                listener.containers.insert(info.id.clone());
                joined.insert(listener_id);
            }
        }

        self.containers.insert(
            info.id.clone(),
            Attached {
                info,
                epoch,
                listeners: joined,
                stop: stop.clone(),
                dying: false,
            },
        );
        Some((epoch, stop))
    }

    /// Removes a container and stops its reader.
    ///
    /// With `Some(epoch)`, only the attachment with that epoch is removed, so
    /// a reader that outlived its attachment cannot detach a newer one.
    /// Listeners bound to a single container are closed with it.
    pub fn detach(&mut self, id: &str, epoch: Option<u64>) -> bool {
        match self.containers.get(id) {
            Some(attached) if epoch.is_none_or(|e| e == attached.epoch) => {}
            _ => return false,
        }
        let Some(attached) = self.containers.remove(id) else {
            return false;
        };
        attached.stop.cancel();

        for listener_id in attached.listeners {
            let ended = match self.listeners.get_mut(&listener_id) {
                Some(listener) => {
                    listener.containers.remove(id);
                    !listener.follow
                        && listener.source.is_single()
                        && listener.containers.is_empty()
                }
                None => false,
            };
            if ended {
                self.remove_listener(listener_id);
            }
        }
        true
    }

    /// Registers a listener and joins it to every attached container its
    /// source selects.
    ///
    /// A `follow` listener is never bound to a single container: it may
    /// start with no match and survives the end of the containers it reads.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::NotFound`] when a non-follow id source names no
    /// attached container.
    pub fn add_listener(
        &mut self,
        source: Source,
        sender: RecordSender,
        done: CancellationToken,
        follow: bool,
    ) -> AttachResult<ListenerId> {
        let matched: Vec<String> = self
            .containers
            .values()
            .filter(|c| source.matches(&c.info.id, &c.info.name))
            .map(|c| c.info.id.clone())
            .collect();

        if let Source::Id(id) = &source {
            if matched.is_empty() && !follow {
                return Err(AttachError::NotFound(id.clone()));
            }
        }

        self.next_listener += 1;
        let listener_id = self.next_listener;
        for container_id in &matched {
            if let Some(attached) = self.containers.get_mut(container_id) {
                attached.listeners.insert(listener_id);
            }
        }

        self.listeners.insert(
            listener_id,
            Listener {
                source,
                sender,
                done,
                follow,
                containers: matched.into_iter().collect(),
            },
        );
        Ok(listener_id)
    }

    /// Flags a container as dead while its reader drains the rest of its
    /// output. Returns the epoch of the attachment, or `None` if the
    /// container is not attached.
    pub fn mark_dying(&mut self, id: &str) -> Option<u64> {
        let attached = self.containers.get_mut(id)?;
        attached.dying = true;
        Some(attached.epoch)
    }

    /// Removes a listener from every container and closes its channel.
    ///
    /// Returns true only for the call that actually removed it.
    pub fn remove_listener(&mut self, listener_id: ListenerId) -> bool {
        let Some(listener) = self.listeners.remove(&listener_id) else {
            return false;
        };
        for container_id in &listener.containers {
            if let Some(attached) = self.containers.get_mut(container_id) {
                attached.listeners.remove(&listener_id);
            }
        }
        listener.done.cancel();
        true
    }

    /// Senders for every listener of an attachment, in registration order.
    /// Empty when the attachment is gone or has been replaced.
    #[must_use]
    pub fn targets(&self, container_id: &str, epoch: u64) -> Vec<(ListenerId, RecordSender)> {
        let Some(attached) = self.containers.get(container_id) else {
            return Vec::new();
        };
        if attached.epoch != epoch {
            return Vec::new();
        }
        attached
            .listeners
            .iter()
            .filter_map(|id| {
                self.listeners
                    .get(id)
                    .map(|listener| (*id, listener.sender.clone()))
            })
            .collect()
    }

    /// Removes every listener, closing their channels.
    pub fn clear_listeners(&mut self) -> usize {
        let ids: Vec<ListenerId> = self.listeners.keys().copied().collect();
        ids.into_iter().filter(|id| self.remove_listener(*id)).count()
    }

    /// Looks up an attached container by full id, short id, or an id
    /// prefix that selects exactly one container.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ContainerInfo> {
        if let Some(attached) = self.containers.get(id) {
            return Some(&attached.info);
        }
        if id.is_empty() {
            return None;
        }
        let infos = self.containers.values().map(|attached| &attached.info);
        if let Some(info) = infos.clone().find(|info| short_id(&info.id) == id) {
            return Some(info);
        }
        let mut prefixed = infos.filter(|info| info.id.starts_with(id));
        match (prefixed.next(), prefixed.next()) {
            (Some(info), None) => Some(info),
            _ => None,
        }
    }

    /// Returns true if the exact id is attached.
    #[must_use]
    pub fn is_attached(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    /// Returns true if the exact id is attached and its container has not
    /// been reported dead.
    #[must_use]
    pub fn is_live(&self, id: &str) -> bool {
        self.containers.get(id).is_some_and(|attached| !attached.dying)
    }

    /// All attached containers.
    #[must_use]
    pub fn containers(&self) -> Vec<ContainerInfo> {
        self.containers.values().map(|c| c.info.clone()).collect()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of listeners registered on one container.
    #[must_use]
    pub fn listeners_of(&self, container_id: &str) -> usize {
        self.containers
            .get(container_id)
            .map_or(0, |attached| attached.listeners.len())
    }
}
