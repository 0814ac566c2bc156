use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::name::ChannelName;

/// Default bound on how long a sender waits for a listener.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between connection attempts while nobody is listening.
pub(crate) const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// A connected named channel stream.
///
/// Returned by [`crate::NamedChannel::accept`] on the owning side and by
/// [`ChannelStream::connect`] on the sending side.
/// On Unix, this wraps a Unix domain socket stream.
/// On Windows, this wraps a named pipe handle.
pub struct ChannelStream {
    inner: ChannelStreamInner,
}

enum ChannelStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    PipeClient(std::fs::File),
    #[cfg(windows)]
    PipeServer(crate::named_pipe::ConnectedPipe),
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(windows)]
            ChannelStreamInner::PipeClient(file) => file.read(buf),
            #[cfg(windows)]
            ChannelStreamInner::PipeServer(pipe) => pipe.read(buf),
        }
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(windows)]
            ChannelStreamInner::PipeClient(file) => file.write(buf),
            #[cfg(windows)]
            ChannelStreamInner::PipeServer(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "channel listener end is inbound only",
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.flush(),
            #[cfg(windows)]
            ChannelStreamInner::PipeClient(file) => file.flush(),
            #[cfg(windows)]
            ChannelStreamInner::PipeServer(_) => Ok(()),
        }
    }
}

impl ChannelStream {
    /// Connect to the owner of `name`, waiting up to `timeout` for a listener.
    ///
    /// While nobody is listening the attempt is retried every 25 ms, so a
    /// sender started just before the owner still gets through.
    pub fn connect(name: &ChannelName, timeout: Duration) -> Result<Self> {
        #[cfg(unix)]
        {
            crate::uds::connect(name, timeout)
        }
        #[cfg(windows)]
        {
            crate::named_pipe::connect(name, timeout)
        }
    }

    /// Create a ChannelStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ChannelStreamInner::Unix(stream),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_pipe_client(file: std::fs::File) -> Self {
        Self {
            inner: ChannelStreamInner::PipeClient(file),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_pipe_server(pipe: crate::named_pipe::ConnectedPipe) -> Self {
        Self {
            inner: ChannelStreamInner::PipeServer(pipe),
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Named pipe handles are synchronous; the timeout is ignored on Windows.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            _ => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying stream.
    ///
    /// Named pipe handles are synchronous; the timeout is ignored on Windows.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            #[cfg(windows)]
            _ => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Process id of the process owning the channel this stream connects to.
    ///
    /// Only meaningful on the sending side. Returns `None` when the
    /// platform cannot report it.
    pub fn server_process_id(&self) -> Option<u32> {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => crate::uds::peer_pid(stream),
            #[cfg(windows)]
            ChannelStreamInner::PipeClient(file) => crate::named_pipe::server_process_id(file),
            #[cfg(windows)]
            ChannelStreamInner::PipeServer(_) => None,
        }
    }

    /// Flush, signal end-of-message to the reader, and release the handle.
    pub fn finish(mut self) -> Result<()> {
        self.flush()?;
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.shutdown(std::net::Shutdown::Write)?,
            // Closing the client handle is what delivers EOF to the pipe server.
            #[cfg(windows)]
            _ => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(_) => "unix",
            #[cfg(windows)]
            ChannelStreamInner::PipeClient(_) => "pipe-client",
            #[cfg(windows)]
            ChannelStreamInner::PipeServer(_) => "pipe-server",
        };
        f.debug_struct("ChannelStream").field("type", &kind).finish()
    }
}
