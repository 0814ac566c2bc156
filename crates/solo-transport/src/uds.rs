use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::name::ChannelName;
use crate::traits::{ChannelStream, CONNECT_RETRY_INTERVAL};

/// Named channel backed by a Unix domain socket.
///
/// On Linux the channel lives in the abstract socket namespace: the kernel
/// refuses a second bind on the same name and releases it when the owner
/// exits, so no filesystem cleanup is involved.
/// On other Unix systems a filesystem socket is used, guarded by an
/// exclusive advisory lock on a sibling lock file held for the channel's lifetime.
pub struct NamedChannel {
    listener: UnixListener,
    name: ChannelName,
    #[cfg(not(target_os = "linux"))]
    socket_file: fs_socket::SocketFile,
}

impl NamedChannel {
    /// Claim `name` exclusively and start listening on it.
    ///
    /// Returns [`TransportError::AlreadyClaimed`] when another process owns it.
    #[cfg(target_os = "linux")]
    pub fn claim(name: &ChannelName) -> Result<Self> {
        let addr = abstract_addr(name).map_err(|source| TransportError::Claim {
            name: name.clone(),
            source,
        })?;

        let listener = UnixListener::bind_addr(&addr).map_err(|source| {
            if source.kind() == ErrorKind::AddrInUse {
                TransportError::AlreadyClaimed { name: name.clone() }
            } else {
                TransportError::Claim {
                    name: name.clone(),
                    source,
                }
            }
        })?;

        info!(%name, "claimed abstract unix socket");

        Ok(Self {
            listener,
            name: name.clone(),
        })
    }

    /// Claim `name` exclusively and start listening on it.
    ///
    /// Returns [`TransportError::AlreadyClaimed`] when another process owns it.
    #[cfg(not(target_os = "linux"))]
    pub fn claim(name: &ChannelName) -> Result<Self> {
        let (listener, socket_file) = fs_socket::claim(name)?;

        info!(%name, path = ?socket_file.path(), "claimed unix domain socket");

        Ok(Self {
            listener,
            name: name.clone(),
            socket_file,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<ChannelStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(name = %self.name, "accepted connection");
        Ok(ChannelStream::from_unix(stream))
    }

    /// The channel name this listener owns.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        if cfg!(target_os = "linux") {
            "abstract-unix-socket"
        } else {
            "unix-domain-socket"
        }
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

pub(crate) fn connect(name: &ChannelName, timeout: Duration) -> Result<ChannelStream> {
    let started = Instant::now();
    loop {
        match connect_once(name) {
            Ok(stream) => {
                debug!(%name, "connected to named channel");
                return Ok(ChannelStream::from_unix(stream));
            }
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(TransportError::NoListener {
                        name: name.clone(),
                        waited,
                    });
                }
                std::thread::sleep(CONNECT_RETRY_INTERVAL.min(timeout - waited));
            }
            Err(source) => {
                return Err(TransportError::Connect {
                    name: name.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn connect_once(name: &ChannelName) -> std::io::Result<UnixStream> {
    UnixStream::connect_addr(&abstract_addr(name)?)
}

#[cfg(not(target_os = "linux"))]
fn connect_once(name: &ChannelName) -> std::io::Result<UnixStream> {
    UnixStream::connect(name.socket_path())
}

#[cfg(target_os = "linux")]
fn abstract_addr(name: &ChannelName) -> std::io::Result<std::os::unix::net::SocketAddr> {
    use std::os::linux::net::SocketAddrExt;

    std::os::unix::net::SocketAddr::from_abstract_name(name.as_str().as_bytes())
}

/// Pid of the process that created the listening socket `stream` is connected to.
#[cfg(target_os = "linux")]
pub(crate) fn peer_pid(stream: &UnixStream) -> Option<u32> {
    use std::os::fd::AsRawFd;

    let mut cred = libc::ucred {
        pid: 0,
        uid: 0,
        gid: 0,
    };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

    // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
    // and the descriptor is an open Unix socket owned by `stream`.
    let rc = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() && cred.pid > 0 {
        Some(cred.pid as u32)
    } else {
        None
    }
}

/// Pid of the process that created the listening socket `stream` is connected to.
#[cfg(target_os = "macos")]
pub(crate) fn peer_pid(stream: &UnixStream) -> Option<u32> {
    use std::os::fd::AsRawFd;

    let mut pid: libc::pid_t = 0;
    let mut len = std::mem::size_of::<libc::pid_t>() as libc::socklen_t;

    // SAFETY: `pid` and `len` are valid writable pointers for the provided sizes,
    // and the descriptor is an open Unix socket owned by `stream`.
    let rc = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            libc::SOL_LOCAL,
            libc::LOCAL_PEERPID,
            (&mut pid as *mut libc::pid_t).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if rc == 0 && pid > 0 {
        Some(pid as u32)
    } else {
        None
    }
}

/// Peer pid is not exposed on this platform.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(crate) fn peer_pid(_stream: &UnixStream) -> Option<u32> {
    None
}

#[cfg(not(target_os = "linux"))]
mod fs_socket {
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::{FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
    use std::os::unix::net::UnixListener;
    use std::path::{Path, PathBuf};

    use fs2::FileExt;
    use tracing::debug;

    use crate::error::{Result, TransportError};
    use crate::name::ChannelName;

    /// Permission mode for socket and lock files.
    const SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` is 104 bytes on macOS and the BSDs.
    const MAX_PATH_LEN: usize = 104;

    /// Filesystem socket owned by this process, plus the lock proving it.
    pub(super) struct SocketFile {
        path: PathBuf,
        created_inode: Option<(u64, u64)>,
        _lock: File,
    }

    impl SocketFile {
        pub(super) fn path(&self) -> &Path {
            &self.path
        }
    }

    pub(super) fn claim(name: &ChannelName) -> Result<(UnixListener, SocketFile)> {
        let path = name.socket_path();
        let claim_err = |source: std::io::Error| TransportError::Claim {
            name: name.clone(),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= MAX_PATH_LEN {
            return Err(TransportError::NameTooLong {
                name: path.display().to_string(),
                len: path_bytes,
                max: MAX_PATH_LEN,
            });
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(SOCKET_MODE)
            .open(name.lock_path())
            .map_err(claim_err)?;

        if let Err(err) = lock.try_lock_exclusive() {
            if is_lock_contended(&err) {
                return Err(TransportError::AlreadyClaimed { name: name.clone() });
            }
            return Err(claim_err(err));
        }

        // Holding the lock: any socket left at the path belongs to a dead owner.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(claim_err)?;
            } else {
                return Err(claim_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AlreadyClaimed { name: name.clone() }
            } else {
                claim_err(source)
            }
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(claim_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(claim_err)?;

        Ok((
            listener,
            SocketFile {
                path,
                created_inode: Some((created.dev(), created.ino())),
                _lock: lock,
            },
        ))
    }

    pub(super) fn is_lock_contended(err: &std::io::Error) -> bool {
        err.kind() == std::io::ErrorKind::WouldBlock
            || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
    }

    impl Drop for SocketFile {
        fn drop(&mut self) {
            // The lock file stays: unlinking it would let a new claimant lock a
            // different inode than a concurrent one that already opened the old file.
            let Some((expected_dev, expected_ino)) = self.created_inode else {
                return;
            };
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn unique_name(tag: &str) -> ChannelName {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos();
        ChannelName::for_identity(&format!("solo-uds-{tag}-{}-{nanos}", std::process::id()))
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
            client.write_all(b"hello").expect("write should succeed");
            client.finish().expect("finish should succeed");
        });

        let mut server = channel.accept().expect("accept should succeed");
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).expect("read to EOF should succeed");
        assert_eq!(buf, b"hello");

        handle.join().expect("client thread should finish");
    }

    #[test]
    fn second_claim_reports_already_claimed() {
        let name = unique_name("exclusive");
        let _owner = NamedChannel::claim(&name).expect("first claim should succeed");

        let result = NamedChannel::claim(&name);
        assert!(matches!(result, Err(TransportError::AlreadyClaimed { .. })));
    }

    #[test]
    fn name_is_reclaimable_after_drop() {
        let name = unique_name("reclaim");
        let owner = NamedChannel::claim(&name).expect("first claim should succeed");
        drop(owner);

        NamedChannel::claim(&name).expect("claim after release should succeed");
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let name = unique_name("race");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let name = name.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    NamedChannel::claim(&name)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("claim thread should finish"))
            .collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let contended = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_already_claimed()))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(contended, 7);
    }

    #[test]
    fn connect_without_listener_is_bounded() {
        let name = unique_name("absent");
        let timeout = Duration::from_millis(200);

        let started = Instant::now();
        let result = ChannelStream::connect(&name, timeout);
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(TransportError::NoListener { .. })));
        assert!(elapsed >= timeout, "should wait for the full timeout");
        assert!(elapsed < Duration::from_secs(2), "should not hang: {elapsed:?}");
    }

    #[test]
    fn connect_waits_for_late_listener() {
        let name = unique_name("late");

        let owner_name = name.clone();
        let owner = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let channel = NamedChannel::claim(&owner_name).expect("late claim should succeed");
            let mut stream = channel.accept().expect("accept should succeed");
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).expect("read should succeed");
            buf
        });

        let mut client =
            ChannelStream::connect(&name, Duration::from_secs(3)).expect("client should connect");
        client.write_all(b"late").expect("write should succeed");
        client.finish().expect("finish should succeed");

        assert_eq!(owner.join().expect("owner thread should finish"), b"late");
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn server_process_id_reports_owner() {
        let name = unique_name("pid");
        let channel = NamedChannel::claim(&name).expect("claim should succeed");

        let client_name = name.clone();
        let handle = std::thread::spawn(move || {
            let client = ChannelStream::connect(&client_name, Duration::from_secs(2))
                .expect("client should connect");
            client.server_process_id()
        });

        let _server = channel.accept().expect("accept should succeed");
        let pid = handle.join().expect("client thread should finish");
        assert_eq!(pid, Some(std::process::id()));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn held_lock_file_means_already_claimed() {
        use fs2::FileExt;

        let name = unique_name("held-lock");
        let holder = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(name.lock_path())
            .expect("lock file should open");
        holder.try_lock_exclusive().expect("external lock should succeed");

        let result = NamedChannel::claim(&name);
        assert!(matches!(result, Err(TransportError::AlreadyClaimed { .. })));

        holder.unlock().expect("unlock should succeed");
        NamedChannel::claim(&name).expect("claim after unlock should succeed");
        let _ = std::fs::remove_file(name.lock_path());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn lock_contention_is_recognised() {
        assert!(fs_socket::is_lock_contended(&fs2::lock_contended_error()));
        assert!(!fs_socket::is_lock_contended(&std::io::Error::from(
            std::io::ErrorKind::PermissionDenied
        )));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn drop_does_not_remove_replaced_path() {
        let name = unique_name("drop-race");
        let channel = NamedChannel::claim(&name).expect("claim should succeed");
        let sock_path = name.socket_path();
        assert!(sock_path.exists());

        // Replace path while the channel is alive.
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(channel);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );

        let _ = std::fs::remove_file(&sock_path);
        let _ = std::fs::remove_file(name.lock_path());
    }
}
