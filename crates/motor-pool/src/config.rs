//! Pool configuration.

use std::time::Duration;

use crate::error::{PoolError, Result};

/// Default maximum number of connections.
pub const DEFAULT_MAX_SIZE: u32 = 10;

/// Default handshake deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of connections allowed, counting idle and
    /// checked-out connections together.
    pub max_size: u32,

    /// Deadline for the connection handshake. Applies to the handshake
    /// only, not name resolution or time spent queued for a slot.
    pub connect_timeout: Option<Duration>,

    /// Per-I/O deadline applied to every operation on every connection,
    /// independently per connection. `None` waits indefinitely.
    pub socket_timeout: Option<Duration>,

    /// Bound on how long an acquire may wait for the pool to free a slot.
    /// `None` suspends the caller until a connection is released.
    pub wait_queue_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            socket_timeout: None,
            wait_queue_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_size(mut self, count: u32) -> Self {
        self.max_size = count;
        self
    }

    /// Set the handshake deadline.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-I/O deadline for established connections.
    #[must_use]
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    /// Bound how long an acquire may wait for a free slot.
    #[must_use]
    pub fn wait_queue_timeout(mut self, timeout: Duration) -> Self {
        self.wait_queue_timeout = Some(timeout);
        self
    }

    /// Validate the configuration.
    ///
    /// Runs at pool construction, before any network activity, so an
    /// invalid capacity can never reach the server.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
