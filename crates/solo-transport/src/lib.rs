//! Exclusive-claim named channels.
//!
//! A named channel is a local, OS-provided endpoint that at most one process
//! can own as a receiver at a time. Claiming is delegated to the OS:
//! - Linux: abstract-namespace Unix domain sockets
//! - Other Unix: `flock`-guarded filesystem sockets
//! - Windows: named pipes created with `FILE_FLAG_FIRST_PIPE_INSTANCE`
//!
//! This is the lowest layer of solo. Everything else builds on top of
//! [`NamedChannel`] and [`ChannelStream`].

pub mod error;
pub mod name;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod named_pipe;

pub use error::{Result, TransportError};
pub use name::ChannelName;
pub use traits::{ChannelStream, DEFAULT_CONNECT_TIMEOUT};

#[cfg(unix)]
pub use uds::NamedChannel;

#[cfg(windows)]
pub use named_pipe::NamedChannel;
