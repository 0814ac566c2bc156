use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use solo_transport::ChannelStream;
use tracing::trace;

use crate::codec::{decode_args, WireConfig};
use crate::error::{Result, WireError};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads one EOF-delimited message from any `Read` stream.
///
/// Handles partial reads internally and stops with
/// [`WireError::PayloadTooLarge`] as soon as the sender exceeds the limit.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: WireConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read every byte until the sender closes its write side (blocking).
    pub fn read_message(&mut self) -> Result<Bytes> {
        self.buf.clear();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                trace!(size = self.buf.len(), "message complete");
                return Ok(self.buf.split().freeze());
            }

            let size = self.buf.len() + read;
            if size > self.config.max_message_size {
                return Err(WireError::PayloadTooLarge {
                    size,
                    max: self.config.max_message_size,
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read one message and decode it as an argument list.
    pub fn read_args(&mut self) -> Result<Vec<String>> {
        let payload = self.read_message()?;
        decode_args(&payload)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }
}

impl MessageReader<ChannelStream> {
    /// Create a reader for a `ChannelStream` and apply the read timeout from config.
    pub fn with_config_channel(inner: ChannelStream, config: WireConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_until_eof() {
        let mut reader = MessageReader::new(Cursor::new(br#"["a","b"]"#.to_vec()));
        let args = reader.read_args().unwrap();
        assert_eq!(args, ["a", "b"]);
    }

    #[test]
    fn reads_payload_larger_than_one_chunk() {
        let big = "x".repeat(3 * READ_CHUNK_SIZE);
        let payload = serde_json::to_vec(&[big.as_str(), "tail"]).unwrap();

        let mut reader = MessageReader::new(Cursor::new(payload));
        let args = reader.read_args().unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].len(), 3 * READ_CHUNK_SIZE);
        assert_eq!(args[1], "tail");
    }

    #[test]
    fn empty_stream_is_malformed() {
        let mut reader = MessageReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_message().unwrap().is_empty());

        let mut reader = MessageReader::new(Cursor::new(Vec::new()));
        assert!(matches!(reader.read_args(), Err(WireError::Malformed(_))));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let config = WireConfig {
            max_message_size: 16,
            ..WireConfig::default()
        };
        let mut reader =
            MessageReader::with_config(Cursor::new(br#"["0123456789","abcdef"]"#.to_vec()), config);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge { max: 16, .. }));
        assert!(err.is_payload_error());
    }

    #[test]
    fn message_exactly_at_limit_is_accepted() {
        let payload = br#"["abc"]"#.to_vec();
        let config = WireConfig {
            max_message_size: payload.len(),
            ..WireConfig::default()
        };
        let mut reader = MessageReader::with_config(Cursor::new(payload), config);
        assert_eq!(reader.read_args().unwrap(), ["abc"]);
    }

    #[test]
    fn timeout_propagates_io_error() {
        let mut reader = MessageReader::new(TimesOut);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, WireError::Io(e) if e.kind() == ErrorKind::TimedOut));
    }

    struct TimesOut;

    impl Read for TimesOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: br#"["ok"]"#.to_vec(),
            pos: 0,
        };
        let mut reader = MessageReader::new(reader);
        assert_eq!(reader.read_args().unwrap(), ["ok"]);
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            // One byte at a time to exercise partial reads.
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }
}
