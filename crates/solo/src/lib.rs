//! Single-instance applications over OS-exclusive named channels.
//!
//! The first process to claim `"<identity>-Pipe"` becomes the primary; every
//! later launch hands its command line to the primary and exits.
//!
//! # Crate Structure
//!
//! - [`transport`]: exclusive channel claim and client connect (Unix sockets, named pipes)
//! - [`wire`]: JSON argument-list payload, read and written until end of stream
//! - [`instance`]: lifecycle, listener, forwarder and foreground activation

/// Re-export transport types.
pub mod transport {
    pub use solo_transport::*;
}

/// Re-export wire format types.
pub mod wire {
    pub use solo_wire::*;
}

/// Re-export single-instance types.
pub mod instance {
    pub use solo_instance::*;
}

pub use solo_instance::{Role, SingleInstance};
