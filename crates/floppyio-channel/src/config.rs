use std::time::Duration;

use floppyio_frame::{Framing, Role};
use floppyio_store::DEFAULT_CAPACITY;

/// How long a synchronized wait sleeps between two reads of a control byte.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Channel configuration, fixed for the lifetime of a [`Channel`](crate::Channel).
///
/// `capacity` and `framing` are part of the wire contract: both endpoints must
/// use the same values, and opposite roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Total size of the shared store in bytes.
    pub capacity: usize,
    /// Which side of the channel this endpoint is.
    pub role: Role,
    /// Text (null-terminated) or binary (length-prefixed) frames.
    pub framing: Framing,
    /// Block in send/receive until the peer has acknowledged.
    pub synchronized: bool,
    /// Limit on each synchronized wait. Zero waits forever.
    pub sync_timeout: Duration,
    /// Raise failures as a panic carrying the [`ChannelError`](crate::ChannelError)
    /// instead of only returning them.
    pub raise_on_error: bool,
    /// Sleep between control-byte polls.
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            role: Role::Guest,
            framing: Framing::Text,
            synchronized: true,
            sync_timeout: Duration::ZERO,
            raise_on_error: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ChannelConfig {
    /// Default configuration for the hypervisor side.
    pub fn host() -> Self {
        Self {
            role: Role::Host,
            ..Self::default()
        }
    }

    /// Default configuration for the virtual machine side.
    pub fn guest() -> Self {
        Self::default()
    }

    /// The wait deadline, `None` meaning forever.
    pub fn effective_timeout(&self) -> Option<Duration> {
        if self.sync_timeout.is_zero() {
            None
        } else {
            Some(self.sync_timeout)
        }
    }

    /// The same configuration seen from the other endpoint.
    pub fn peer(&self) -> Self {
        Self {
            role: self.role.peer(),
            ..self.clone()
        }
    }
}
