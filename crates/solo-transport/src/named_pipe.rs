use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_NO_DATA, ERROR_PIPE_BUSY,
    ERROR_PIPE_CONNECTED, GENERIC_WRITE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_FIRST_PIPE_INSTANCE, OPEN_EXISTING, PIPE_ACCESS_INBOUND,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, GetNamedPipeServerProcessId,
    WaitNamedPipeW, PIPE_READMODE_BYTE, PIPE_REJECT_REMOTE_CLIENTS, PIPE_TYPE_BYTE, PIPE_WAIT,
};

use crate::error::{Result, TransportError};
use crate::name::ChannelName;
use crate::traits::{ChannelStream, CONNECT_RETRY_INTERVAL};

const BUFFER_SIZE: u32 = 4096;

/// Named channel backed by a single-instance Windows named pipe.
///
/// The pipe is created with `FILE_FLAG_FIRST_PIPE_INSTANCE`, so the create
/// call itself is the exclusive claim. It accepts one client at a time.
pub struct NamedChannel {
    pipe: Arc<File>,
    name: ChannelName,
}

impl NamedChannel {
    /// Claim `name` exclusively and start listening on it.
    ///
    /// Returns [`TransportError::AlreadyClaimed`] when another process owns it.
    pub fn claim(name: &ChannelName) -> Result<Self> {
        let path = to_wide(&name.pipe_path());

        // SAFETY: `path` is a NUL-terminated UTF-16 string that outlives the call;
        // a null security attributes pointer selects the default descriptor.
        let handle = unsafe {
            CreateNamedPipeW(
                path.as_ptr(),
                PIPE_ACCESS_INBOUND | FILE_FLAG_FIRST_PIPE_INSTANCE,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT | PIPE_REJECT_REMOTE_CLIENTS,
                1,
                BUFFER_SIZE,
                BUFFER_SIZE,
                0,
                std::ptr::null(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            let source = std::io::Error::last_os_error();
            return Err(match source.raw_os_error() {
                Some(code) if code == ERROR_ACCESS_DENIED as i32 || code == ERROR_PIPE_BUSY as i32 => {
                    TransportError::AlreadyClaimed { name: name.clone() }
                }
                _ => TransportError::Claim {
                    name: name.clone(),
                    source,
                },
            });
        }

        info!(%name, "claimed named pipe");

        // SAFETY: `handle` is a valid pipe handle we exclusively own from here on.
        let pipe = unsafe { File::from_raw_handle(handle) };
        Ok(Self {
            pipe: Arc::new(pipe),
            name: name.clone(),
        })
    }

    /// Accept an incoming connection (blocking).
    ///
    /// The returned stream disconnects the client when dropped, which readies
    /// the pipe for the next `accept`.
    pub fn accept(&self) -> Result<ChannelStream> {
        // SAFETY: the pipe handle stays open for as long as `self.pipe` lives.
        let ok = unsafe { ConnectNamedPipe(self.pipe.as_raw_handle(), std::ptr::null_mut()) };
        if ok == 0 {
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                // Client connected between our disconnect and this call, or already
                // wrote and closed; either way its data is ready to read.
                Some(code) if code == ERROR_PIPE_CONNECTED as i32 || code == ERROR_NO_DATA as i32 => {}
                _ => {
                    // SAFETY: see above.
                    unsafe { DisconnectNamedPipe(self.pipe.as_raw_handle()) };
                    return Err(TransportError::Accept(err));
                }
            }
        }

        debug!(name = %self.name, "accepted connection");
        Ok(ChannelStream::from_pipe_server(ConnectedPipe {
            pipe: Arc::clone(&self.pipe),
        }))
    }

    /// The channel name this listener owns.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "named-pipe"
    }
}

impl std::fmt::Debug for NamedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedChannel")
            .field("name", &self.name)
            .field("transport", &self.transport_name())
            .finish()
    }
}

/// Server side of one accepted pipe connection.
pub(crate) struct ConnectedPipe {
    pipe: Arc<File>,
}

impl Read for ConnectedPipe {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        // A closed client surfaces as ERROR_BROKEN_PIPE, which std maps to Ok(0).
        (&*self.pipe).read(buf)
    }
}

impl Drop for ConnectedPipe {
    fn drop(&mut self) {
        // SAFETY: the pipe handle is open while any Arc clone is alive.
        unsafe { DisconnectNamedPipe(self.pipe.as_raw_handle()) };
    }
}

pub(crate) fn connect(name: &ChannelName, timeout: Duration) -> Result<ChannelStream> {
    let path = to_wide(&name.pipe_path());
    let started = Instant::now();

    loop {
        // SAFETY: `path` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                path.as_ptr(),
                GENERIC_WRITE,
                0,
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };

        if handle != INVALID_HANDLE_VALUE {
            debug!(%name, "connected to named pipe");
            // SAFETY: `handle` is a valid client pipe handle we exclusively own.
            let file = unsafe { File::from_raw_handle(handle) };
            return Ok(ChannelStream::from_pipe_client(file));
        }

        let source = std::io::Error::last_os_error();
        let waited = started.elapsed();
        let remaining = timeout.saturating_sub(waited);

        match source.raw_os_error() {
            Some(code) if code == ERROR_FILE_NOT_FOUND as i32 => {
                if remaining.is_zero() {
                    return Err(TransportError::NoListener {
                        name: name.clone(),
                        waited,
                    });
                }
                std::thread::sleep(CONNECT_RETRY_INTERVAL.min(remaining));
            }
            Some(code) if code == ERROR_PIPE_BUSY as i32 => {
                if remaining.is_zero() {
                    return Err(TransportError::ConnectTimeout {
                        name: name.clone(),
                        timeout,
                    });
                }
                let wait_ms = remaining.as_millis().clamp(1, u128::from(u32::MAX - 1)) as u32;
                // The outcome is re-evaluated by the next CreateFileW attempt.
                // SAFETY: `path` is NUL-terminated and outlives the call.
                unsafe { WaitNamedPipeW(path.as_ptr(), wait_ms) };
            }
            _ => {
                return Err(TransportError::Connect {
                    name: name.clone(),
                    source,
                })
            }
        }
    }
}

pub(crate) fn server_process_id(file: &File) -> Option<u32> {
    let mut pid = 0u32;
    // SAFETY: `file` holds an open client pipe handle and `pid` is writable.
    let ok = unsafe { GetNamedPipeServerProcessId(file.as_raw_handle(), &mut pid) };
    (ok != 0).then_some(pid)
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn unique_name(tag: &str) -> ChannelName {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos();
        ChannelName::for_identity(&format!("solo-pipe-{tag}-{}-{nanos}", std::process::id()))
            .expect("test identity should be valid")
    }

    #[test]
    fn claim_accept_connect() {
        let name = unique_name("roundtrip");
        let channel = NamedChannel::claim(&name).expect("first claim should succeed");

        let client_name = name.clone();
        let handle = std::thread::spawn(move || {
            let mut client = ChannelStream::connect(&client_name, Duration::from_secs(2))
                .expect("client should connect");
            let pid = client.server_process_id();
            client.write_all(b"hello").expect("write should succeed");
            client.finish().expect("finish should succeed");
            pid
        });

        let mut server = channel.accept().expect("accept should succeed");
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).expect("read to EOF should succeed");
        assert_eq!(buf, b"hello");
        assert_eq!(
            handle.join().expect("client thread should finish"),
            Some(std::process::id())
        );
    }

    #[test]
    fn second_claim_reports_already_claimed() {
        let name = unique_name("exclusive");
        let _owner = NamedChannel::claim(&name).expect("first claim should succeed");

        let result = NamedChannel::claim(&name);
        assert!(matches!(result, Err(TransportError::AlreadyClaimed { .. })));
    }

    #[test]
    fn connect_without_listener_is_bounded() {
        let name = unique_name("absent");
        let timeout = Duration::from_millis(200);

        let started = Instant::now();
        let result = ChannelStream::connect(&name, timeout);

        assert!(matches!(result, Err(TransportError::NoListener { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
