use std::sync::Arc;

use solo_transport::{ChannelName, ChannelStream, TransportError};
use solo_wire::MessageWriter;

use crate::activation::{platform_activation, ForegroundActivation};
use crate::config::InstanceConfig;
use crate::diagnostics::{Diagnostics, LogSink};

/// What happened to one forwarding attempt.
///
/// Forwarding is fire-and-forget: `delivered` means the payload was written
/// and the channel closed, not that the primary processed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// The full payload was written to the primary.
    pub delivered: bool,
    /// Process id of the primary, when the platform reports it.
    pub server_pid: Option<u32>,
}

/// Client role: hands this process's arguments to the channel owner.
pub struct Forwarder {
    name: ChannelName,
    config: InstanceConfig,
    activation: Arc<dyn ForegroundActivation>,
    diag: Diagnostics,
}

impl Forwarder {
    /// Forwarder for `name` with default config and the platform activation hook.
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            config: InstanceConfig::default(),
            activation: platform_activation(),
            diag: Diagnostics::default(),
        }
    }

    pub(crate) fn from_parts(
        name: ChannelName,
        config: InstanceConfig,
        activation: Arc<dyn ForegroundActivation>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            name,
            config,
            activation,
            diag,
        }
    }

    /// Override timeouts and size limits.
    pub fn with_config(mut self, config: InstanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the foreground activation hook.
    pub fn with_activation(mut self, activation: Arc<dyn ForegroundActivation>) -> Self {
        self.activation = activation;
        self
    }

    /// Mirror diagnostics to an embedder log sink.
    pub fn with_log(mut self, sink: LogSink) -> Self {
        self.diag = Diagnostics::new(Some(sink));
        self
    }

    /// Send `args` to the primary.
    ///
    /// Never fails: connect, activation and write errors are logged and
    /// reported through [`ForwardOutcome`].
    pub fn forward<S: AsRef<str>>(&self, args: &[S]) -> ForwardOutcome {
        let stream = match ChannelStream::connect(&self.name, self.config.connect_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                self.diag.warn(&format!("failed to send arguments to existing instance: {err}"));
                return ForwardOutcome {
                    delivered: false,
                    server_pid: None,
                };
            }
        };

        let server_pid = stream.server_process_id();
        self.grant_foreground(server_pid);

        let delivered = match self.send(stream, args) {
            Ok(()) => {
                self.diag.info(&format!("sent {} argument(s) to existing instance", args.len()));
                true
            }
            Err(err) => {
                self.diag.warn(&format!("failed to send arguments to existing instance: {err}"));
                false
            }
        };

        ForwardOutcome {
            delivered,
            server_pid,
        }
    }

    /// Check whether a primary is listening, without forwarding anything.
    ///
    /// Returns the primary's process id when the platform reports it.
    pub fn probe(&self) -> Result<Option<u32>, TransportError> {
        let stream = ChannelStream::connect(&self.name, self.config.connect_timeout)?;
        let server_pid = stream.server_process_id();
        stream.finish()?;
        Ok(server_pid)
    }

    /// The channel this forwarder targets.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    fn grant_foreground(&self, server_pid: Option<u32>) {
        let Some(pid) = server_pid else {
            self.diag.debug("existing instance process id unavailable");
            return;
        };

        match self.activation.allow_foreground(pid) {
            Ok(()) => self.diag.debug(&format!(
                "allowed existing instance (pid {pid}) to take the foreground via {}",
                self.activation.name()
            )),
            Err(err) => self.diag.warn(&format!(
                "failed to allow existing instance to take the foreground: {err}"
            )),
        }
    }

    fn send<S: AsRef<str>>(&self, stream: ChannelStream, args: &[S]) -> solo_wire::Result<()> {
        let mut writer = MessageWriter::with_config_channel(stream, self.config.wire())?;
        writer.write_args(args)?;
        writer.finish()
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("activation", &self.activation.name())
            .finish()
    }
}
