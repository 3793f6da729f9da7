//! Attach manager: container discovery, per-container readers and fan-out.

use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use spout_logs::{ContainerInfo, LineSplitter, LogRecord, Source, StreamType};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AttachConfig;
use crate::error::{AttachError, AttachResult};
use crate::registry::{ListenerId, RecordSender, Registry};
use crate::runtime::{ContainerRuntime, EventStream, OutputStream, RuntimeEvent};

struct Inner {
    runtime: Arc<dyn ContainerRuntime>,
    config: AttachConfig,
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

/// Owns the set of attached containers and fans their output out to
/// listeners.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct AttachManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AttachManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl AttachManager {
    /// Creates a manager with no attached containers and no event loop.
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: AttachConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                config,
                registry: Mutex::new(Registry::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Creates a manager, attaches every running container and starts
    /// following lifecycle events.
    ///
    /// The event subscription is opened before the backfill so no start is
    /// missed in between; duplicate starts are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be subscribed to or listed.
    pub async fn start(
        runtime: Arc<dyn ContainerRuntime>,
        config: AttachConfig,
    ) -> AttachResult<Self> {
        let manager = Self::new(runtime, config);
        let events = manager.inner.runtime.events().await?;
        let attached = manager.backfill().await?;
        info!(containers = attached, "attached running containers");
        manager.spawn_event_loop(events);
        Ok(manager)
    }

    /// Attaches every currently running container. Containers that fail to
    /// attach are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the running containers cannot be listed.
    pub async fn backfill(&self) -> AttachResult<usize> {
        let running = self.inner.runtime.list_running().await?;
        let mut attached = 0;
        for container in running {
            match self.attach_info(container.clone()).await {
                Ok(true) => attached += 1,
                Ok(false) => {}
                Err(e) => warn!(id = %container.short_id(), error = %e, "failed to attach container"),
            }
        }
        Ok(attached)
    }

    /// Spawns the task that applies runtime lifecycle events.
    ///
    /// Events are applied one at a time, so attach and detach for the same
    /// container never race each other. A death does not stop the reader:
    /// it drains what the container wrote and detaches at end of output.
    pub fn spawn_event_loop(&self, mut events: EventStream) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = manager.inner.shutdown.cancelled() => break,
                    next = events.next() => next,
                };

                match event {
                    Some(Ok(RuntimeEvent::Started(id))) => {
                        if let Err(e) = manager.attach(&id).await {
                            warn!(id = %id, error = %e, "failed to attach started container");
                        }
                    }
                    Some(Ok(RuntimeEvent::Died(id))) => manager.container_died(&id),
                    Some(Err(e)) => warn!(error = %e, "runtime event stream error"),
                    None => {
                        warn!("runtime event stream ended");
                        break;
                    }
                }
            }
        })
    }

    /// Attaches a running container by id.
    ///
    /// Returns false if it was already attached.
    ///
    /// # Errors
    ///
    /// Returns error if the container cannot be inspected or attached.
    pub async fn attach(&self, id: &str) -> AttachResult<bool> {
        if self.inner.registry.lock().is_live(id) {
            return Ok(false);
        }
        let container = self.inner.runtime.inspect(id).await?;
        self.attach_info(container).await
    }

    async fn attach_info(&self, container: ContainerInfo) -> AttachResult<bool> {
        if self.inner.registry.lock().is_live(&container.id) {
            return Ok(false);
        }
        let output = self.inner.runtime.attach(&container.id).await?;

        let registered = self
            .inner
            .registry
            .lock()
            .attach(container.clone(), &self.inner.shutdown);
        let Some((epoch, stop)) = registered else {
            return Ok(false);
        };

        info!(id = %container.short_id(), name = %container.name, "attached container");
        let manager = self.clone();
        tokio::spawn(async move { manager.read_loop(container, epoch, stop, output).await });
        Ok(true)
    }

    /// Stops reading a container and closes the listeners bound to it.
    pub fn detach(&self, id: &str) -> bool {
        let detached = self.inner.registry.lock().detach(id, None);
        if detached {
            info!(id = %spout_logs::short_id(id), "detached container");
        }
        detached
    }

    /// Marks a container dead and bounds how long its reader may keep
    /// draining. The reader normally detaches first, at end of output.
    fn container_died(&self, id: &str) {
        let Some(epoch) = self.inner.registry.lock().mark_dying(id) else {
            return;
        };
        debug!(id = %spout_logs::short_id(id), "container died, draining output");

        let manager = self.clone();
        let id = id.to_string();
        let grace = self.inner.config.drain_grace;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(grace) => {}
                () = manager.inner.shutdown.cancelled() => return,
            }
            if manager.inner.registry.lock().detach(&id, Some(epoch)) {
                warn!(id = %spout_logs::short_id(&id), ?grace, "output still open after death, detached");
            }
        });
    }

    /// Looks up an attached container by full id, short id or unique id
    /// prefix.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ContainerInfo> {
        self.inner.registry.lock().get(id).cloned()
    }

    /// All attached containers.
    #[must_use]
    pub fn containers(&self) -> Vec<ContainerInfo> {
        self.inner.registry.lock().containers()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.lock().listener_count()
    }

    /// Manager configuration.
    #[must_use]
    pub fn config(&self) -> &AttachConfig {
        &self.inner.config
    }

    /// Registers `out` as a listener for `source`.
    ///
    /// Records start flowing immediately. The registration lasts until the
    /// returned [`Subscription`] is cancelled or dropped, the listener is
    /// evicted, or (for id and name sources) its container ends.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AttachError::NotFound`] when an id source names no
    /// attached container, and [`crate::AttachError::ShutDown`] after
    /// [`AttachManager::shutdown`].
    pub fn subscribe(&self, source: Source, out: RecordSender) -> AttachResult<Subscription> {
        self.register(source, out, false)
    }

    /// Registers `out` as a long-lived listener for `source`.
    ///
    /// Unlike [`AttachManager::subscribe`], the listener is not tied to any
    /// single container: it joins every matching container as it starts,
    /// including ones that are not running yet, and ends only when cancelled,
    /// evicted or the manager shuts down. After shutdown the returned
    /// subscription is already closed.
    pub fn follow(&self, source: Source, out: RecordSender) -> Subscription {
        match self.register(source, out, true) {
            Ok(subscription) => subscription,
            Err(_) => Subscription::closed_now(self.clone()),
        }
    }

    fn register(&self, source: Source, out: RecordSender, follow: bool) -> AttachResult<Subscription> {
        let done = self.inner.shutdown.child_token();
        let description = source.to_string();
        let id = {
            let mut registry = self.inner.registry.lock();
            // shutdown cancels before it clears listeners under this lock
            if self.is_shutdown() {
                return Err(AttachError::ShutDown);
            }
            registry.add_listener(source, out, done.clone(), follow)?
        };
        debug!(listener = id, source = %description, follow, "listener registered");
        Ok(Subscription {
            manager: self.clone(),
            id,
            done,
        })
    }

    /// Registers `out` as a listener for `source` and waits until `cancel`
    /// fires or the subscription ends on its own.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AttachError::NotFound`] when an id source names no
    /// attached container.
    pub async fn listen(
        &self,
        source: Source,
        out: RecordSender,
        cancel: CancellationToken,
    ) -> AttachResult<()> {
        let subscription = self.subscribe(source, out)?;
        tokio::select! {
            () = cancel.cancelled() => {}
            () = subscription.closed() => {}
        }
        subscription.cancel();
        Ok(())
    }

    /// Stops every reader and ends every subscription.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let removed = self.inner.registry.lock().clear_listeners();
        info!(listeners = removed, "attach manager stopped");
    }

    /// Returns true once [`AttachManager::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.registry.lock().remove_listener(id)
    }

    fn evict(&self, id: ListenerId, container: &ContainerInfo, slow: bool) {
        if !self.remove_listener(id) {
            return;
        }
        if slow {
            warn!(
                listener = id,
                container = %container.name,
                timeout = ?self.inner.config.delivery_timeout,
                "evicted slow listener"
            );
        } else {
            debug!(listener = id, container = %container.name, "removed disconnected listener");
        }
    }

    async fn read_loop(
        self,
        container: ContainerInfo,
        epoch: u64,
        stop: CancellationToken,
        mut output: OutputStream,
    ) {
        let mut stdout = LineSplitter::with_max_line(self.inner.config.max_line);
        let mut stderr = LineSplitter::with_max_line(self.inner.config.max_line);

        loop {
            let next = tokio::select! {
                biased;
                () = stop.cancelled() => break,
                next = output.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let splitter = match chunk.stream {
                        StreamType::Stdout => &mut stdout,
                        StreamType::Stderr => &mut stderr,
                    };
                    for line in splitter.push(&chunk.bytes) {
                        self.deliver(&container, epoch, LogRecord::new(&container, chunk.stream, line))
                            .await;
                    }
                }
                Some(Err(e)) => {
                    warn!(id = %container.short_id(), error = %e, "container output failed");
                    break;
                }
                None => {
                    debug!(id = %container.short_id(), "container output ended");
                    break;
                }
            }
        }

        for (stream, splitter) in [
            (StreamType::Stdout, &mut stdout),
            (StreamType::Stderr, &mut stderr),
        ] {
            if let Some(rest) = splitter.finish() {
                self.deliver(&container, epoch, LogRecord::new(&container, stream, rest))
                    .await;
            }
        }

        if self.inner.registry.lock().detach(&container.id, Some(epoch)) {
            info!(id = %container.short_id(), "detached container");
        }
    }

    /// Hands one record to every listener of the attachment.
    ///
    /// Listeners with room receive it immediately. Full listeners are waited
    /// on concurrently for at most the delivery timeout and evicted if they
    /// do not drain, so a stalled consumer delays the reader by one timeout
    /// at most once.
    async fn deliver(&self, container: &ContainerInfo, epoch: u64, record: LogRecord) {
        let targets = self.inner.registry.lock().targets(&container.id, epoch);
        if targets.is_empty() {
            return;
        }

        let record = Arc::new(record);
        let mut full = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(Arc::clone(&record)) {
                Ok(()) => {}
                Err(TrySendError::Full(record)) => full.push((id, sender, record)),
                Err(TrySendError::Closed(_)) => self.evict(id, container, false),
            }
        }
        if full.is_empty() {
            return;
        }

        let timeout = self.inner.config.delivery_timeout;
        let results = join_all(full.into_iter().map(|(id, sender, record)| async move {
            (id, sender.send_timeout(record, timeout).await)
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => self.evict(id, container, true),
                Err(SendTimeoutError::Closed(_)) => self.evict(id, container, false),
            }
        }
    }
}

/// A live listener registration.
///
/// Dropping the subscription unregisters the listener.
#[derive(Debug)]
pub struct Subscription {
    manager: AttachManager,
    id: ListenerId,
    done: CancellationToken,
}

impl Subscription {
    fn closed_now(manager: AttachManager) -> Self {
        let done = CancellationToken::new();
        done.cancel();
        Self {
            manager,
            id: 0,
            done,
        }
    }

    /// Listener id.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Resolves once the listener has been removed for any reason.
    pub async fn closed(&self) {
        self.done.cancelled().await;
    }

    /// Returns true once the listener has been removed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Unregisters the listener. Returns true only for the call that
    /// actually removed it.
    pub fn cancel(&self) -> bool {
        let removed = self.manager.remove_listener(self.id);
        if removed {
            debug!(listener = self.id, "listener cancelled");
        }
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.manager.remove_listener(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRuntime;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const WEB1: &str = "aaaaaaaaaaaa1111";
    const WEB2: &str = "bbbbbbbbbbbb2222";
    const DB1: &str = "cccccccccccc3333";

    fn info(id: &str, name: &str) -> ContainerInfo {
        ContainerInfo::new(id, name, "busybox:latest")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    async fn recv(rx: &mut mpsc::Receiver<Arc<LogRecord>>) -> Option<Arc<LogRecord>> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for record")
    }

    async fn started(
        containers: &[(&str, &str)],
        config: AttachConfig,
    ) -> (Arc<MemoryRuntime>, AttachManager) {
        let runtime = Arc::new(MemoryRuntime::new());
        for (id, name) in containers {
            runtime.seed_container(info(id, name));
        }
        let manager = AttachManager::start(runtime.clone(), config).await.unwrap();
        (runtime, manager)
    }

    #[tokio::test]
    async fn backfill_attaches_running_containers() {
        let (runtime, manager) =
            started(&[(WEB1, "web-1"), (DB1, "db-1")], AttachConfig::default()).await;

        assert_eq!(manager.containers().len(), 2);
        assert_eq!(runtime.attach_count(WEB1), 1);
        assert_eq!(manager.get("aaaaaaaaaaaa").map(|c| c.name), Some("web-1".to_string()));
        assert!(manager.get("ffff").is_none());
    }

    #[tokio::test]
    async fn fans_out_in_order_to_matching_listeners_only() {
        let (runtime, manager) =
            started(&[(WEB1, "web-1"), (DB1, "db-1")], AttachConfig::default()).await;

        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let (tx_db, mut rx_db) = mpsc::channel(16);
        let _a = manager.subscribe(Source::id(WEB1), tx_a).unwrap();
        let _b = manager.subscribe(Source::filter("web"), tx_b).unwrap();
        let _db = manager.subscribe(Source::name("db-1"), tx_db).unwrap();

        runtime.write(WEB1, StreamType::Stdout, "one\ntw");
        runtime.write(WEB1, StreamType::Stdout, "o\nthree\n");

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in ["one", "two", "three"] {
                let record = recv(rx).await.unwrap();
                assert_eq!(record.data, expected);
                assert_eq!(record.name, "web-1");
                assert_eq!(record.stream, StreamType::Stdout);
            }
        }
        assert!(rx_db.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_listener_joins_containers_started_later() {
        let (runtime, manager) = started(&[], AttachConfig::default()).await;

        let (tx, mut rx) = mpsc::channel(16);
        let _all = manager.subscribe(Source::All, tx).unwrap();

        runtime.start_container(info(WEB2, "web-2"));
        wait_until(|| manager.get(WEB2).is_some()).await;
        runtime.write(WEB2, StreamType::Stderr, "late\n");

        let record = recv(&mut rx).await.unwrap();
        assert_eq!(record.id, WEB2);
        assert_eq!(record.stream, StreamType::Stderr);
        assert_eq!(record.data, "late");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (_runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, _rx) = mpsc::channel(1);
        let result = manager
            .listen(Source::id("ffffffffffff"), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(crate::AttachError::NotFound(_))));
    }

    #[tokio::test]
    async fn container_death_ends_single_source_listeners() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;

        let (tx_id, mut rx_id) = mpsc::channel(16);
        let (tx_all, _rx_all) = mpsc::channel(16);
        let id_sub = manager.subscribe(Source::id(WEB1), tx_id).unwrap();
        let all_sub = manager.subscribe(Source::All, tx_all).unwrap();

        runtime.stop_container(WEB1);

        wait_until(|| manager.get(WEB1).is_none()).await;
        tokio::time::timeout(Duration::from_secs(2), id_sub.closed())
            .await
            .unwrap();

        assert!(recv(&mut rx_id).await.is_none());
        assert!(!all_sub.is_closed());
        assert_eq!(manager.listener_count(), 1);
    }

    #[tokio::test]
    async fn death_delivers_everything_written_before_it() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, mut rx) = mpsc::channel(4096);
        let _all = manager.subscribe(Source::All, tx).unwrap();

        for i in 0..2000 {
            runtime.write(WEB1, StreamType::Stdout, format!("line {i}\n"));
        }
        runtime.write(WEB1, StreamType::Stdout, "last words");
        runtime.stop_container(WEB1);

        for i in 0..2000 {
            assert_eq!(recv(&mut rx).await.unwrap().data, format!("line {i}"));
        }
        assert_eq!(recv(&mut rx).await.unwrap().data, "last words");
        wait_until(|| manager.get(WEB1).is_none()).await;
    }

    #[tokio::test]
    async fn output_left_open_after_death_is_detached_after_grace() {
        let config = AttachConfig::default().with_drain_grace(Duration::from_millis(50));
        let (runtime, manager) = started(&[(WEB1, "web-1")], config).await;
        let (tx, mut rx) = mpsc::channel(16);
        let subscription = manager.subscribe(Source::id(WEB1), tx).unwrap();

        runtime.write(WEB1, StreamType::Stdout, "before\n");
        runtime.announce_death(WEB1);

        assert_eq!(recv(&mut rx).await.unwrap().data, "before");
        tokio::time::timeout(Duration::from_secs(2), subscription.closed())
            .await
            .unwrap();
        assert!(manager.get(WEB1).is_none());
        wait_until(|| runtime.attach_count(WEB1) == 0).await;
    }

    #[tokio::test]
    async fn detach_stops_reader_immediately() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, _rx) = mpsc::channel(16);
        let subscription = manager.subscribe(Source::name("web-1"), tx).unwrap();

        assert!(manager.detach(WEB1));
        assert!(!manager.detach(WEB1));
        assert!(subscription.is_closed());
        wait_until(|| runtime.attach_count(WEB1) == 0).await;
    }

    #[tokio::test]
    async fn partial_line_is_flushed_at_end_of_output() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, mut rx) = mpsc::channel(16);
        let _sub = manager.subscribe(Source::name("web-1"), tx).unwrap();

        runtime.write(WEB1, StreamType::Stdout, "no newline");
        runtime.close_output(WEB1);

        assert_eq!(recv(&mut rx).await.unwrap().data, "no newline");
        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn listen_returns_on_cancel_and_removes_once() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let task = {
            let manager = manager.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.listen(Source::id(WEB1), tx, cancel).await })
        };
        wait_until(|| manager.listener_count() == 1).await;

        // both triggers at once
        cancel.cancel();
        runtime.stop_container(WEB1);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(manager.listener_count(), 0);
    }

    #[tokio::test]
    async fn subscription_cancel_is_idempotent() {
        let (_runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, mut rx) = mpsc::channel(16);
        let subscription = manager.subscribe(Source::All, tx).unwrap();

        assert!(subscription.cancel());
        assert!(!subscription.cancel());
        assert!(subscription.is_closed());
        assert!(rx.recv().await.is_none());
        drop(subscription);
        assert_eq!(manager.listener_count(), 0);
    }

    #[tokio::test]
    async fn slow_listener_is_evicted_without_stalling_fast_one() {
        let config = AttachConfig::default().with_delivery_timeout(Duration::from_millis(50));
        let (runtime, manager) = started(&[(WEB1, "web-1")], config).await;

        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(64);
        let slow = manager.subscribe(Source::id(WEB1), slow_tx).unwrap();
        let _fast = manager.subscribe(Source::id(WEB1), fast_tx).unwrap();

        runtime.write(WEB1, StreamType::Stdout, "1\n2\n3\n4\n5\n");

        for expected in ["1", "2", "3", "4", "5"] {
            assert_eq!(recv(&mut fast_rx).await.unwrap().data, expected);
        }

        tokio::time::timeout(Duration::from_secs(2), slow.closed())
            .await
            .unwrap();
        assert_eq!(manager.listener_count(), 1);

        // the slow listener keeps what fit in its buffer, then sees the end
        assert_eq!(recv(&mut slow_rx).await.unwrap().data, "1");
        assert!(recv(&mut slow_rx).await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_is_removed_on_next_record() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, rx) = mpsc::channel(4);
        let subscription = manager.subscribe(Source::All, tx).unwrap();
        drop(rx);

        runtime.write(WEB1, StreamType::Stdout, "hello\n");
        tokio::time::timeout(Duration::from_secs(2), subscription.closed())
            .await
            .unwrap();
        assert_eq!(manager.listener_count(), 0);
    }

    #[tokio::test]
    async fn read_error_ends_fan_out_for_that_container_only() {
        let (runtime, manager) =
            started(&[(WEB1, "web-1"), (DB1, "db-1")], AttachConfig::default()).await;

        runtime.fail_output(WEB1, "connection reset");
        wait_until(|| manager.get(WEB1).is_none()).await;
        assert!(manager.get(DB1).is_some());
    }

    #[tokio::test]
    async fn restarted_container_is_reattached() {
        let (runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;

        runtime.stop_container(WEB1);
        wait_until(|| manager.get(WEB1).is_none()).await;

        runtime.start_container(info(WEB1, "web-1"));
        wait_until(|| manager.get(WEB1).is_some()).await;
        assert_eq!(runtime.attach_count(WEB1), 1);
    }

    #[tokio::test]
    async fn follow_survives_container_restart() {
        let (runtime, manager) = started(&[], AttachConfig::default()).await;
        let (tx, mut rx) = mpsc::channel(16);
        let subscription = manager.follow(Source::name("web-1"), tx);

        for round in ["first", "second"] {
            runtime.start_container(info(WEB1, "web-1"));
            wait_until(|| manager.get(WEB1).is_some()).await;
            runtime.write(WEB1, StreamType::Stdout, format!("{round}\n"));
            assert_eq!(recv(&mut rx).await.unwrap().data, round);

            runtime.stop_container(WEB1);
            wait_until(|| manager.get(WEB1).is_none()).await;
        }
        assert!(!subscription.is_closed());
    }

    #[tokio::test]
    async fn shutdown_ends_subscriptions() {
        let (_runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        let (tx, _rx) = mpsc::channel(4);
        let subscription = manager.subscribe(Source::All, tx).unwrap();

        manager.shutdown();
        tokio::time::timeout(Duration::from_secs(2), subscription.closed())
            .await
            .unwrap();
        assert!(manager.is_shutdown());
        assert_eq!(manager.listener_count(), 0);
    }

    #[tokio::test]
    async fn no_registrations_after_shutdown() {
        let (_runtime, manager) = started(&[(WEB1, "web-1")], AttachConfig::default()).await;
        manager.shutdown();

        let (tx, mut rx) = mpsc::channel(4);
        let result = manager.subscribe(Source::All, tx.clone());
        assert!(matches!(result, Err(AttachError::ShutDown)));

        let followed = manager.follow(Source::name("web-1"), tx);
        assert!(followed.is_closed());
        assert_eq!(manager.listener_count(), 0);
        drop(followed);
        assert!(recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn long_unterminated_output_is_forwarded_in_pieces() {
        let config = AttachConfig::default().with_max_line(16);
        let (runtime, manager) = started(&[(WEB1, "web-1")], config).await;
        let (tx, mut rx) = mpsc::channel(16);
        let _sub = manager.subscribe(Source::All, tx).unwrap();

        runtime.write(WEB1, StreamType::Stdout, "x".repeat(40));

        assert_eq!(recv(&mut rx).await.unwrap().data, "x".repeat(16));
        assert_eq!(recv(&mut rx).await.unwrap().data, "x".repeat(16));
    }
}
