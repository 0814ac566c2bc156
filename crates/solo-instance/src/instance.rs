use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use solo_transport::{ChannelName, NamedChannel};

use crate::activation::{platform_activation, ForegroundActivation};
use crate::config::InstanceConfig;
use crate::diagnostics::{Diagnostics, LogSink};
use crate::error::{InstanceError, Result};
use crate::forwarder::Forwarder;
use crate::listener::{self, ListenerHandle, NewInstanceHandler};

/// Outcome of the claim race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// This process owns the channel and receives forwarded arguments.
    Primary,
    /// Another process owns the channel; arguments were handed to it.
    Secondary,
}

impl Role {
    pub fn is_primary(self) -> bool {
        self == Role::Primary
    }

    pub fn is_secondary(self) -> bool {
        self == Role::Secondary
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => f.write_str("primary"),
            Role::Secondary => f.write_str("secondary"),
        }
    }
}

/// Where a [`SingleInstance`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    NotStarted,
    Listening,
    Forwarded,
    Disposed,
}

enum State {
    NotStarted,
    Listening(ListenerHandle),
    Forwarded,
    Disposed,
}

impl State {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            State::NotStarted => LifecycleState::NotStarted,
            State::Listening(_) => LifecycleState::Listening,
            State::Forwarded => LifecycleState::Forwarded,
            State::Disposed => LifecycleState::Disposed,
        }
    }
}

struct Inner {
    state: State,
    role: Option<Role>,
    handler: Option<NewInstanceHandler>,
}

/// One application's claim on its single-instance channel.
///
/// Build with [`SingleInstance::builder`], then call [`start`](Self::start)
/// once. The primary keeps listening until [`dispose`](Self::dispose) or drop.
pub struct SingleInstance {
    identity: String,
    config: InstanceConfig,
    activation: Arc<dyn ForegroundActivation>,
    diag: Diagnostics,
    inner: Mutex<Inner>,
}

/// Collects the embedder's collaborators for a [`SingleInstance`].
pub struct SingleInstanceBuilder {
    identity: String,
    handler: Option<NewInstanceHandler>,
    sink: Option<LogSink>,
    config: InstanceConfig,
    activation: Option<Arc<dyn ForegroundActivation>>,
}

impl SingleInstanceBuilder {
    /// Callback run on the primary for every forwarded argument list.
    ///
    /// Invoked sequentially on the listener thread, never on the thread that
    /// called `start`.
    pub fn on_new_instance<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Vec<String>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Receive lifecycle diagnostics as plain messages.
    ///
    /// The sink is never called with the instance's lock held, so it may call
    /// [`SingleInstance::state`] or [`SingleInstance::role`].
    pub fn log<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn config(mut self, config: InstanceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Replace the platform foreground activation hook.
    pub fn activation(mut self, activation: Arc<dyn ForegroundActivation>) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn build(self) -> SingleInstance {
        SingleInstance {
            identity: self.identity,
            config: self.config,
            activation: self.activation.unwrap_or_else(platform_activation),
            diag: Diagnostics::new(self.sink),
            inner: Mutex::new(Inner {
                state: State::NotStarted,
                role: None,
                handler: self.handler,
            }),
        }
    }
}

impl SingleInstance {
    pub fn builder(identity: impl Into<String>) -> SingleInstanceBuilder {
        SingleInstanceBuilder {
            identity: identity.into(),
            handler: None,
            sink: None,
            config: InstanceConfig::default(),
            activation: None,
        }
    }

    /// Claim the channel or forward `args` to whoever holds it.
    ///
    /// Returns [`Role::Secondary`] even when forwarding failed; the failure is
    /// logged. Only claim failures other than contention are errors.
    ///
    /// # Panics
    ///
    /// When called more than once on the same instance.
    pub fn start<I, S>(&self, args: I) -> Result<Role>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.lock();
        if !matches!(inner.state, State::NotStarted) {
            drop(inner);
            panic!("SingleInstance already started");
        }

        let name = ChannelName::for_identity(&self.identity).map_err(InstanceError::Claim)?;

        // The log sink runs without the lock held so it may query this instance.
        match NamedChannel::claim(&name) {
            Ok(channel) => {
                let handler = inner.handler.take();
                let handle = listener::spawn(channel, handler, &self.config, self.diag.clone())?;
                inner.state = State::Listening(handle);
                inner.role = Some(Role::Primary);
                drop(inner);

                self.diag.info(&format!("listening for new instances on {name}"));
                Ok(Role::Primary)
            }
            Err(err) if err.is_already_claimed() => {
                // Secondaries never run the callback.
                inner.handler = None;
                inner.state = State::Forwarded;
                inner.role = Some(Role::Secondary);
                drop(inner);

                self.diag
                    .info(&format!("{name} is owned by another instance; forwarding arguments"));
                let args: Vec<String> = args.into_iter().map(Into::into).collect();
                Forwarder::from_parts(
                    name,
                    self.config.clone(),
                    Arc::clone(&self.activation),
                    self.diag.clone(),
                )
                .forward(args.as_slice());
                Ok(Role::Secondary)
            }
            Err(err) => {
                drop(inner);
                self.diag.warn(&format!("failed to claim {name}: {err}"));
                Err(InstanceError::Claim(err))
            }
        }
    }

    /// [`start`](Self::start) with this process's command-line arguments,
    /// program name excluded. Non-UTF-8 arguments are converted lossily.
    pub fn start_with_env_args(&self) -> Result<Role> {
        self.start(std::env::args_os().skip(1).map(|arg| arg.to_string_lossy().into_owned()))
    }

    /// Stop listening and release the channel.
    ///
    /// Blocks until the listener has stopped, unless called from inside the
    /// callback. No callback starts after this returns. Idempotent.
    pub fn dispose(&self) {
        let handle = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.state, State::Disposed) {
                State::Listening(handle) => Some(handle),
                State::Forwarded => {
                    inner.state = State::Forwarded;
                    None
                }
                State::NotStarted | State::Disposed => None,
            }
        };

        if let Some(mut handle) = handle {
            handle.shutdown();
            self.diag.info(&format!("stopped listening on {}", handle.name()));
        }
    }

    /// The role decided by `start`, if it has run.
    pub fn role(&self) -> Option<Role> {
        self.lock().role
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state.lifecycle()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The channel name derived from the identity.
    pub fn channel_name(&self) -> solo_transport::Result<ChannelName> {
        ChannelName::for_identity(&self.identity)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SingleInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SingleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleInstance")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
