use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use solo_transport::{ChannelName, ChannelStream, NamedChannel};
use solo_wire::{MessageReader, WireConfig};
use tracing::debug;

use crate::config::InstanceConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{InstanceError, Result};

/// Callback invoked on the primary with each forwarded argument list.
pub type NewInstanceHandler = Box<dyn FnMut(Vec<String>) + Send + 'static>;

const LISTENER_THREAD_NAME: &str = "solo-listener";
const ACCEPT_RETRY_MIN: Duration = Duration::from_millis(10);
const ACCEPT_RETRY_MAX: Duration = Duration::from_secs(1);
const WAKE_ATTEMPTS: usize = 2;

/// Handle to a running accept loop.
///
/// The loop owns the claimed channel; the channel is released when the loop
/// ends. Dropping the handle shuts the loop down.
pub struct ListenerHandle {
    name: ChannelName,
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    wake_timeout: Duration,
    diag: Diagnostics,
}

/// Start the accept loop for `channel` on a dedicated background thread.
///
/// Returns once the thread is running; the caller is never blocked on
/// incoming connections.
pub(crate) fn spawn(
    channel: NamedChannel,
    handler: Option<NewInstanceHandler>,
    config: &InstanceConfig,
    diag: Diagnostics,
) -> Result<ListenerHandle> {
    let name = channel.name().clone();
    let cancelled = Arc::new(AtomicBool::new(false));

    let accept_loop = AcceptLoop {
        channel,
        handler,
        wire: config.wire(),
        cancelled: Arc::clone(&cancelled),
        diag: diag.clone(),
    };

    let thread = std::thread::Builder::new()
        .name(LISTENER_THREAD_NAME.to_string())
        .spawn(move || accept_loop.run())
        .map_err(InstanceError::Spawn)?;

    Ok(ListenerHandle {
        name,
        cancelled,
        thread: Some(thread),
        wake_timeout: config.connect_timeout,
        diag,
    })
}

impl ListenerHandle {
    /// Stop the accept loop and release the channel.
    ///
    /// Blocks until the loop has exited, so no callback runs after this
    /// returns. Called from inside the callback it only requests the stop;
    /// the loop exits and releases the channel once the callback returns.
    ///
    /// If the loop cannot be woken (a Windows pipe stays busy while a
    /// connection is being served for longer than twice the connect timeout),
    /// the thread is detached. It still exits and releases the channel as
    /// soon as that connection finishes, and runs no further callbacks.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.cancelled.store(true, Ordering::SeqCst);

        if thread.thread().id() == std::thread::current().id() {
            debug!(name = %self.name, "shutdown requested from listener thread; not joining");
            return;
        }

        // The loop may be parked in accept; a throwaway connection lets it observe the flag.
        let woken = (0..WAKE_ATTEMPTS).any(|_| thread.is_finished() || self.wake());

        if !woken {
            self.diag.warn("listener did not acknowledge shutdown; detaching background thread");
            return;
        }

        if thread.join().is_err() {
            self.diag.warn("listener thread terminated abnormally");
        }
    }

    fn wake(&self) -> bool {
        match ChannelStream::connect(&self.name, self.wake_timeout) {
            Ok(_stream) => true,
            Err(err) => {
                debug!(name = %self.name, error = %err, "could not wake listener");
                false
            }
        }
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// The channel this listener serves.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

struct AcceptLoop {
    channel: NamedChannel,
    handler: Option<NewInstanceHandler>,
    wire: WireConfig,
    cancelled: Arc<AtomicBool>,
    diag: Diagnostics,
}

impl AcceptLoop {
    fn run(mut self) {
        let mut retry_delay = ACCEPT_RETRY_MIN;

        while !self.is_cancelled() {
            let accepted = self.channel.accept();
            if self.is_cancelled() {
                break;
            }

            match accepted {
                Ok(stream) => {
                    retry_delay = ACCEPT_RETRY_MIN;
                    self.serve(stream);
                }
                Err(err) => {
                    self.diag.warn(&format!("error while waiting for connections: {err}"));
                    std::thread::sleep(retry_delay);
                    retry_delay = (retry_delay * 2).min(ACCEPT_RETRY_MAX);
                }
            }
        }

        debug!(name = %self.channel.name(), "listener stopped");
    }

    /// Read, decode and dispatch one connection. Failures stay here.
    fn serve(&mut self, stream: ChannelStream) {
        self.diag.debug("received connection, trying to read arguments");

        let mut reader = match MessageReader::with_config_channel(stream, self.wire.clone()) {
            Ok(reader) => reader,
            Err(err) => {
                self.diag.warn(&format!("error while preparing connection: {err}"));
                return;
            }
        };

        let payload = match reader.read_message() {
            Ok(payload) => payload,
            Err(_) if self.is_cancelled() => return,
            Err(err) if err.is_payload_error() => {
                self.diag.warn(&format!("failed to decode forwarded arguments: {err}"));
                return;
            }
            Err(err) => {
                self.diag.warn(&format!("error while receiving arguments: {err}"));
                return;
            }
        };

        // Senders always write at least `[]`; an empty message is a liveness probe.
        if payload.is_empty() {
            self.diag.debug("received liveness probe");
            return;
        }

        self.diag.debug(&format!("received payload: {}", String::from_utf8_lossy(&payload)));

        let args = match solo_wire::decode_args(&payload) {
            Ok(args) => args,
            Err(err) => {
                self.diag.warn(&format!("failed to decode forwarded arguments: {err}"));
                return;
            }
        };

        if self.is_cancelled() {
            self.diag.debug("discarding arguments received during shutdown");
            return;
        }

        self.diag.info(&format!("received {} forwarded argument(s)", args.len()));
        self.dispatch(args);
    }

    fn dispatch(&mut self, args: Vec<String>) {
        let Some(handler) = self.handler.as_mut() else {
            return;
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(args))) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            self.diag.warn(&format!("new-instance callback panicked: {reason}"));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
