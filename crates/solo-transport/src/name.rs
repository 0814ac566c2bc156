use std::fmt;

use crate::error::{Result, TransportError};

/// Suffix appended to an application identity to form its channel name.
pub const CHANNEL_SUFFIX: &str = "-Pipe";

/// Longest abstract socket name (`sun_path` minus the leading NUL).
#[cfg(target_os = "linux")]
const MAX_NAME_LEN: usize = 107;
/// Pipe names are limited to 256 characters including `\\.\pipe\`.
#[cfg(windows)]
const MAX_NAME_LEN: usize = 256 - PIPE_PREFIX.len();
/// Filesystem sockets are checked against `sun_path` once the full path is known.
#[cfg(not(any(target_os = "linux", windows)))]
const MAX_NAME_LEN: usize = 255;

#[cfg(windows)]
const PIPE_PREFIX: &str = r"\\.\pipe\";

/// Validated name of a named channel.
///
/// Cooperating processes derive the same name from the same application
/// identity via [`ChannelName::for_identity`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelName {
    name: String,
}

impl ChannelName {
    /// Derive the channel name for an application identity (`"<identity>-Pipe"`).
    pub fn for_identity(identity: &str) -> Result<Self> {
        if identity.is_empty() {
            return Err(TransportError::InvalidName {
                name: identity.to_string(),
                reason: "application identity must not be empty",
            });
        }
        Self::new(format!("{identity}{CHANNEL_SUFFIX}"))
    }

    /// Use a raw channel name as-is.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(TransportError::InvalidName {
                name,
                reason: "name must not be empty",
            });
        }
        if name.contains('\0') {
            return Err(TransportError::InvalidName {
                name,
                reason: "name must not contain NUL",
            });
        }
        if name.contains('/') || name.contains('\\') {
            return Err(TransportError::InvalidName {
                name,
                reason: "name must not contain path separators",
            });
        }

        let len = name.len();
        if len > MAX_NAME_LEN {
            return Err(TransportError::NameTooLong {
                name,
                len,
                max: MAX_NAME_LEN,
            });
        }

        Ok(Self { name })
    }

    /// The channel name without any platform prefix.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Full named pipe path (`\\.\pipe\<name>`).
    #[cfg(windows)]
    pub fn pipe_path(&self) -> String {
        format!("{PIPE_PREFIX}{}", self.name)
    }

    /// Filesystem socket path under the runtime directory.
    #[cfg(all(unix, not(target_os = "linux")))]
    pub fn socket_path(&self) -> std::path::PathBuf {
        runtime_dir().join(format!("{}.sock", self.name))
    }

    /// Lock file guarding ownership of [`ChannelName::socket_path`].
    #[cfg(all(unix, not(target_os = "linux")))]
    pub fn lock_path(&self) -> std::path::PathBuf {
        runtime_dir().join(format!("{}.lock", self.name))
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Directory holding filesystem sockets: `$XDG_RUNTIME_DIR`, else the temp dir.
#[cfg(all(unix, not(target_os = "linux")))]
fn runtime_dir() -> std::path::PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => std::path::PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_gets_pipe_suffix() {
        let name = ChannelName::for_identity("MyTestApp").expect("identity should be valid");
        assert_eq!(name.as_str(), "MyTestApp-Pipe");
        assert_eq!(name.to_string(), "MyTestApp-Pipe");
    }

    #[test]
    fn same_identity_same_name_different_identity_different_name() {
        let a1 = ChannelName::for_identity("app.one").unwrap();
        let a2 = ChannelName::for_identity("app.one").unwrap();
        let b = ChannelName::for_identity("app.two").unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn rejects_empty_identity() {
        let result = ChannelName::for_identity("");
        assert!(matches!(result, Err(TransportError::InvalidName { .. })));
    }

    #[test]
    fn rejects_separators_and_nul() {
        for bad in ["a/b", r"a\b", "a\0b"] {
            let result = ChannelName::for_identity(bad);
            assert!(
                matches!(result, Err(TransportError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overlong_name() {
        let result = ChannelName::for_identity(&"x".repeat(400));
        assert!(matches!(result, Err(TransportError::NameTooLong { .. })));
    }

    #[test]
    fn accepts_non_ascii_identity() {
        let name = ChannelName::for_identity("приложение-日本").expect("unicode should be valid");
        assert!(name.as_str().ends_with(CHANNEL_SUFFIX));
    }
}
