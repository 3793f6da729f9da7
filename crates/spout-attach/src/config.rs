//! Attach manager configuration.

use std::time::Duration;

use spout_logs::DEFAULT_MAX_LINE;

/// Default per-listener channel capacity for callers that size their own
/// channels from the config.
pub const DEFAULT_LISTENER_BUFFER: usize = 256;

/// Default time a reader waits on a full listener before evicting it.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time a dead container's output may keep draining before the
/// container is detached regardless.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the attach manager.
#[derive(Debug, Clone)]
pub struct AttachConfig {
    /// How long delivery to a full listener may wait before the listener
    /// is evicted.
    pub delivery_timeout: Duration,
    /// Capacity for listener channels created by this process.
    pub listener_buffer: usize,
    /// How long a reader may keep draining after its container died.
    pub drain_grace: Duration,
    /// Longest partial line held per stream before it is forwarded as is.
    pub max_line: usize,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            listener_buffer: DEFAULT_LISTENER_BUFFER,
            drain_grace: DEFAULT_DRAIN_GRACE,
            max_line: DEFAULT_MAX_LINE,
        }
    }
}

impl AttachConfig {
    /// Set the delivery timeout.
    #[must_use]
    pub const fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Set the listener buffer size. Zero is raised to one.
    #[must_use]
    pub fn with_listener_buffer(mut self, size: usize) -> Self {
        self.listener_buffer = size.max(1);
        self
    }

    /// Set the drain grace after container death.
    #[must_use]
    pub const fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Set the partial line limit.
    #[must_use]
    pub const fn with_max_line(mut self, bytes: usize) -> Self {
        self.max_line = bytes;
        self
    }
}
