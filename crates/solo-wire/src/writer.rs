use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use solo_transport::ChannelStream;

use crate::codec::{encode_args, WireConfig};
use crate::error::{Result, WireError};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes one message to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: WireConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write an argument list (blocking).
    pub fn write_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        encode_args(args, &mut buf)?;
        let result = self.write_message(&buf);
        self.buf = buf;
        result
    }

    /// Write a raw payload in full (blocking).
    pub fn write_message(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_message_size {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_message_size,
            });
        }

        let mut offset = 0usize;
        while offset < payload.len() {
            match self.inner.write(&payload[offset..]) {
                Ok(0) => return Err(WireError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl MessageWriter<ChannelStream> {
    /// Create a writer for a `ChannelStream` and apply the write timeout from config.
    pub fn with_config_channel(inner: ChannelStream, config: WireConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }

    /// Close the write side so the reader sees end-of-message, then release the channel.
    pub fn finish(self) -> Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}
