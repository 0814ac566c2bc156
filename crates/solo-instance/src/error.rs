use solo_transport::TransportError;

/// Fatal errors from starting a single instance.
///
/// Contention is not an error: losing the claim yields `Role::Secondary`.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// The channel could not be claimed for a reason other than contention
    /// (invalid identity, permissions, resource exhaustion).
    #[error("failed to claim single-instance channel: {0}")]
    Claim(#[source] TransportError),

    /// The background listener thread could not be started.
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The OS refused to let another process take the foreground.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("foreground permission for process {pid} was refused: {source}")]
    Denied { pid: u32, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, InstanceError>;
