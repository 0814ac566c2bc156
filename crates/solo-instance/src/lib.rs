//! Single-instance arbitration for desktop-style applications.
//!
//! The first process to claim an application's named channel becomes the
//! primary and listens for forwarded command lines on a background thread.
//! Every later process finds the channel claimed, forwards its arguments to
//! the primary, and should exit.
//!
//! ```no_run
//! use solo_instance::{Role, SingleInstance};
//!
//! let instance = SingleInstance::builder("com.example.viewer")
//!     .on_new_instance(|args| println!("opened again with {args:?}"))
//!     .build();
//!
//! if instance.start_with_env_args()? == Role::Secondary {
//!     return Ok(());
//! }
//! // ... run the application; `instance` stops listening when dropped.
//! # Ok::<(), solo_instance::InstanceError>(())
//! ```

pub mod activation;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod forwarder;
pub mod instance;
pub mod listener;

pub use activation::{platform_activation, ForegroundActivation, NoopActivation};
#[cfg(windows)]
pub use activation::WindowsActivation;
pub use config::InstanceConfig;
pub use diagnostics::LogSink;
pub use error::{ActivationError, InstanceError, Result};
pub use forwarder::{ForwardOutcome, Forwarder};
pub use instance::{LifecycleState, Role, SingleInstance, SingleInstanceBuilder};
pub use listener::{ListenerHandle, NewInstanceHandler};
