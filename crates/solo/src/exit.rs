use std::fmt;
use std::io;

use solo_instance::InstanceError;
use solo_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Claim { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidName { .. } | TransportError::NameTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::NoListener { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        TransportError::ConnectTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn instance_error(context: &str, err: InstanceError) -> CliError {
    match err {
        InstanceError::Claim(err) => transport_error(context, err),
        InstanceError::Spawn(source) => CliError::new(INTERNAL, format!("{context}: {source}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use solo_transport::ChannelName;

    use super::*;

    fn name() -> ChannelName {
        ChannelName::for_identity("exit-codes").expect("identity should be valid")
    }

    #[test]
    fn invalid_identity_is_usage_error() {
        let err = ChannelName::for_identity("").unwrap_err();
        assert_eq!(transport_error("claim failed", err).code, USAGE);
    }

    #[test]
    fn unreachable_primary_codes() {
        let missing = TransportError::NoListener {
            name: name(),
            waited: Duration::from_millis(10),
        };
        assert_eq!(transport_error("send failed", missing).code, FAILURE);

        let busy = TransportError::ConnectTimeout {
            name: name(),
            timeout: Duration::from_millis(10),
        };
        assert_eq!(transport_error("send failed", busy).code, TIMEOUT);
    }

    #[test]
    fn claim_permission_denied_maps_through_io() {
        let err = InstanceError::Claim(TransportError::Claim {
            name: name(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        let cli = instance_error("start failed", err);
        assert_eq!(cli.code, PERMISSION_DENIED);
        assert!(cli.message.starts_with("start failed: "));
    }
}
