/// Errors that can occur while encoding, reading, or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload is not a JSON array of strings.
    #[error("malformed argument payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The argument list could not be serialized.
    #[error("failed to encode argument payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing a message.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying channel reported an error.
    #[error("channel error: {0}")]
    Transport(#[from] solo_transport::TransportError),
}

impl WireError {
    /// Whether the failure is about the payload rather than the connection.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            WireError::Malformed(_) | WireError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
