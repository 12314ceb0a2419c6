use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_into, EnvelopeConfig, HEADER_SIZE};
use crate::error::{EnvelopeError, Result};
use crate::message::Envelope;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete envelopes to any `Write` stream.
pub struct EnvelopeWriter<T> {
    inner: T,
    buf: BytesMut,
    config: EnvelopeConfig,
}

impl<T: Write> EnvelopeWriter<T> {
    /// Create a new envelope writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, EnvelopeConfig::default())
    }

    /// Create a new envelope writer with explicit configuration.
    pub fn with_config(inner: T, config: EnvelopeConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send an envelope (blocking).
    pub fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.buf.clear();
        encode_into(envelope, &mut self.buf)?;

        let payload_len = self.buf.len() - HEADER_SIZE;
        if payload_len > self.config.max_payload_size {
            return Err(EnvelopeError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }

        let buf = std::mem::take(&mut self.buf);
        let result = self.write_all_raw(&buf);
        self.buf = buf;
        result
    }

    /// Send bytes that are already a complete encoded envelope.
    pub fn send_raw(&mut self, raw: &[u8]) -> Result<()> {
        let payload_len = raw.len().saturating_sub(HEADER_SIZE);
        if payload_len > self.config.max_payload_size {
            return Err(EnvelopeError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }
        self.write_all_raw(raw)
    }

    fn write_all_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(EnvelopeError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
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
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current envelope writer configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

#[cfg(unix)]
impl EnvelopeWriter<std::os::unix::net::UnixStream> {
    /// Create an envelope writer for a Unix stream and apply the write timeout.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: EnvelopeConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
