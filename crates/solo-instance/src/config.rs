use std::time::Duration;

use solo_transport::DEFAULT_CONNECT_TIMEOUT;
use solo_wire::{WireConfig, DEFAULT_MAX_MESSAGE_SIZE};

/// Tunables shared by the listener and the forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    /// How long a secondary waits for the primary to accept. Default: 5 s.
    pub connect_timeout: Duration,
    /// Bound on reading one forwarded message. Default: 5 s.
    ///
    /// Ignored on Windows, where pipe reads are synchronous.
    pub read_timeout: Option<Duration>,
    /// Largest accepted payload in bytes. Default: 1 MiB.
    pub max_message_size: usize,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(Duration::from_secs(5)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl InstanceConfig {
    pub(crate) fn wire(&self) -> WireConfig {
        WireConfig {
            max_message_size: self.max_message_size,
            read_timeout: self.read_timeout,
            write_timeout: Some(self.connect_timeout),
        }
    }
}
