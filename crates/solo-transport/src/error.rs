use std::time::Duration;

use crate::name::ChannelName;

/// Errors that can occur in named channel operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Another process already owns the channel.
    ///
    /// This is the expected outcome for every instance but the first.
    #[error("channel {name} is already claimed by another process")]
    AlreadyClaimed { name: ChannelName },

    /// Failed to claim the channel for a reason other than contention.
    #[error("failed to claim {name}: {source}")]
    Claim {
        name: ChannelName,
        source: std::io::Error,
    },

    /// Nobody started listening on the channel before the deadline.
    #[error("no listener on {name} after {waited:?}")]
    NoListener { name: ChannelName, waited: Duration },

    /// A listener exists but did not accept the connection in time.
    #[error("timed out after {timeout:?} waiting for {name} to accept")]
    ConnectTimeout { name: ChannelName, timeout: Duration },

    /// Failed to connect to the channel.
    #[error("failed to connect to {name}: {source}")]
    Connect {
        name: ChannelName,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on a connected stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel name cannot be used as a platform address.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The channel name is too long for the platform address.
    #[error("channel name too long ({len} bytes, max {max}): {name}")]
    NameTooLong { name: String, len: usize, max: usize },
}

impl TransportError {
    /// Whether this error means another process owns the channel.
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, TransportError::AlreadyClaimed { .. })
    }

    /// Whether this error means the channel could not be reached at all.
    ///
    /// Covers "nobody listening", "listener busy" and connect I/O failures.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::NoListener { .. }
                | TransportError::ConnectTimeout { .. }
                | TransportError::Connect { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
