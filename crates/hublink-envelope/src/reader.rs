use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{decode, split_envelope, EnvelopeConfig};
use crate::error::{EnvelopeError, Result};
use crate::message::Envelope;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete envelopes from any `Read` stream.
///
/// Handles partial reads internally. [`read_raw`](Self::read_raw) hands back
/// the unverified bytes so the receiver can run its own verification step.
pub struct EnvelopeReader<T> {
    inner: T,
    buf: BytesMut,
    config: EnvelopeConfig,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a new envelope reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, EnvelopeConfig::default())
    }

    /// Create a new envelope reader with explicit configuration.
    pub fn with_config(inner: T, config: EnvelopeConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope without verifying its payload (blocking).
    ///
    /// Returns `Err(EnvelopeError::ConnectionClosed)` when EOF is reached.
    pub fn read_raw(&mut self) -> Result<Bytes> {
        loop {
            if let Some(raw) = split_envelope(&mut self.buf, self.config.max_payload_size)? {
                trace!(len = raw.len(), "envelope received");
                return Ok(raw);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
            };

            if read == 0 {
                return Err(EnvelopeError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read, verify and decode the next envelope (blocking).
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        let raw = self.read_raw()?;
        decode(&raw)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current envelope reader configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

#[cfg(unix)]
impl EnvelopeReader<std::os::unix::net::UnixStream> {
    /// Create an envelope reader for a Unix stream and apply the read timeout.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: EnvelopeConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode, encode_into, verify, MAGIC, PROTOCOL_VERSION};
    use crate::message::{MessageType, NanoappMessage};

    fn wire(envelopes: &[Envelope]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for envelope in envelopes {
            encode_into(envelope, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_multiple_envelopes() {
        let message = Envelope::NanoappMessage(NanoappMessage::new(7, 1, 2, b"abc".to_vec()));
        let bytes = wire(&[
            Envelope::HubInfoRequest,
            message.clone(),
            Envelope::NanoappListRequest,
        ]);

        let mut reader = EnvelopeReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_envelope().unwrap(), Envelope::HubInfoRequest);
        assert_eq!(reader.read_envelope().unwrap(), message);
        assert_eq!(reader.read_envelope().unwrap(), Envelope::NanoappListRequest);
        assert!(matches!(
            reader.read_envelope(),
            Err(EnvelopeError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_raw_does_not_verify_payload() {
        // Request tag carrying bytes it should not have.
        let mut bytes = BytesMut::new();
        bytes.put_slice(&MAGIC);
        bytes.put_u8(PROTOCOL_VERSION);
        bytes.put_u8(MessageType::HubInfoRequest as u8);
        bytes.put_u32_le(2);
        bytes.put_slice(&[0xAA, 0xBB]);

        let mut reader = EnvelopeReader::new(Cursor::new(bytes.to_vec()));
        let raw = reader.read_raw().unwrap();
        assert_eq!(raw.len(), 10);
        assert!(!verify(&raw));
    }

    #[test]
    fn partial_read_handling() {
        let bytes = encode(&Envelope::NanoappMessage(NanoappMessage::new(
            1,
            2,
            3,
            b"slow".to_vec(),
        )))
        .unwrap();

        let mut reader = EnvelopeReader::new(ByteByByteReader {
            bytes: bytes.to_vec(),
            pos: 0,
        });
        let raw = reader.read_raw().unwrap();
        assert_eq!(raw, bytes);
    }

    #[test]
    fn connection_closed_mid_envelope() {
        let bytes = encode(&Envelope::NanoappMessage(NanoappMessage::new(
            1,
            2,
            3,
            b"cut".to_vec(),
        )))
        .unwrap();

        let mut reader = EnvelopeReader::new(Cursor::new(bytes[..bytes.len() - 1].to_vec()));
        assert!(matches!(
            reader.read_raw(),
            Err(EnvelopeError::ConnectionClosed)
        ));
    }

    #[test]
    fn invalid_magic_in_stream() {
        let bytes = vec![0x00, 0x01, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00];
        let mut reader = EnvelopeReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_raw(),
            Err(EnvelopeError::InvalidMagic)
        ));
    }

    #[test]
    fn oversized_envelope_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&MAGIC);
        bytes.put_u8(PROTOCOL_VERSION);
        bytes.put_u8(MessageType::NanoappMessage as u8);
        bytes.put_u32_le(1024);

        let cfg = EnvelopeConfig {
            max_payload_size: 16,
            ..EnvelopeConfig::default()
        };
        let mut reader = EnvelopeReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        assert!(matches!(
            reader.read_raw(),
            Err(EnvelopeError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = encode(&Envelope::HubInfoRequest).unwrap();
        let mut reader = EnvelopeReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes.to_vec()),
        });
        assert_eq!(reader.read_envelope().unwrap(), Envelope::HubInfoRequest);
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::EnvelopeWriter::new(left);
        let cfg = EnvelopeConfig {
            read_timeout: Some(std::time::Duration::from_secs(5)),
            ..EnvelopeConfig::default()
        };
        let mut reader = EnvelopeReader::with_config_unix(right, cfg).unwrap();

        writer.send(&Envelope::NanoappListRequest).unwrap();
        assert_eq!(reader.read_envelope().unwrap(), Envelope::NanoappListRequest);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
