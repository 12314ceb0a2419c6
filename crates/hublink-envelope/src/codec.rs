use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{EnvelopeError, Result};
use crate::message::{
    Envelope, HubInfoResponse, MessageType, NanoappListEntry, NanoappListResponse, NanoappMessage,
};

/// Envelope header: magic (2) + version (1) + tag (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "HB" (0x48 0x42).
pub const MAGIC: [u8; 2] = [0x48, 0x42];

/// Envelope layout revision written by this codec.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default maximum payload size: 4 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 4096;

/// Wire size of one nanoapp list entry.
pub const NANOAPP_LIST_ENTRY_SIZE: usize = 14;

// app_id (8) + message_type (4) + host_endpoint (2)
const NANOAPP_MESSAGE_FIXED_SIZE: usize = 14;
// two u32 versions, four f32 power figures, max_message_len, platform_id, version
const HUB_INFO_FIXED_SIZE: usize = 40;
// app_id (8) + app_version (4), followed by the two flag bytes
const NANOAPP_LIST_ENTRY_IDS_SIZE: usize = 12;

/// Fixed envelope header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u8,
    /// Raw type tag; not yet checked against [`MessageType`].
    pub tag: u8,
    pub payload_len: usize,
}

/// A structurally verified envelope, borrowed from its buffer.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedEnvelope<'a> {
    pub message_type: MessageType,
    pub payload: &'a [u8],
}

/// Configuration for envelope streams.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Maximum payload size in bytes. Default: 4 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Parse the fixed header. Only the magic is validated here.
pub fn parse_header(buf: &[u8]) -> Result<EnvelopeHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(EnvelopeError::Truncated {
            needed: HEADER_SIZE,
            available: buf.len(),
        });
    }

    if buf[0..2] != MAGIC {
        return Err(EnvelopeError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;

    Ok(EnvelopeHeader {
        version: buf[2],
        tag: buf[3],
        payload_len,
    })
}

/// Returns true if `buf` is a structurally valid envelope.
pub fn verify(buf: &[u8]) -> bool {
    verify_envelope(buf).is_ok()
}

/// Structurally verify an envelope.
///
/// Checks the header, that the declared payload length matches the buffer,
/// and that every field the tag requires is present and in bounds with no
/// bytes left over. Nothing is read past the end of `buf`.
pub fn verify_envelope(buf: &[u8]) -> Result<VerifiedEnvelope<'_>> {
    let header = parse_header(buf)?;
    if header.version != PROTOCOL_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(header.version));
    }
    let message_type = MessageType::try_from(header.tag)?;

    let payload = &buf[HEADER_SIZE..];
    if header.payload_len != payload.len() {
        return Err(EnvelopeError::LengthMismatch {
            declared: header.payload_len,
            actual: payload.len(),
        });
    }

    verify_payload(message_type, payload)?;

    Ok(VerifiedEnvelope {
        message_type,
        payload,
    })
}

fn verify_payload(message_type: MessageType, payload: &[u8]) -> Result<()> {
    let mut cursor = Cursor::new(payload);

    match message_type {
        MessageType::NanoappMessage => {
            cursor.skip(NANOAPP_MESSAGE_FIXED_SIZE)?;
            cursor.vector()?;
        }
        MessageType::HubInfoRequest | MessageType::NanoappListRequest => {}
        MessageType::HubInfoResponse => {
            for _ in 0..3 {
                cursor.vector()?;
            }
            cursor.skip(HUB_INFO_FIXED_SIZE)?;
        }
        MessageType::NanoappListResponse => {
            let count = cursor.u32()? as usize;
            // Bound the entry walk by the bytes actually present.
            let needed = count
                .checked_mul(NANOAPP_LIST_ENTRY_SIZE)
                .unwrap_or(usize::MAX);
            cursor.ensure(needed)?;
            for _ in 0..count {
                cursor.skip(NANOAPP_LIST_ENTRY_IDS_SIZE)?;
                cursor.bool("enabled")?;
                cursor.bool("is_system")?;
            }
        }
    }

    cursor.finish(message_type)
}

/// Verify and decode an envelope.
pub fn decode(buf: &[u8]) -> Result<Envelope> {
    let verified = verify_envelope(buf)?;
    decode_verified(verified)
}

/// Decode an envelope that has already passed [`verify_envelope`].
///
/// Every read is still bounds-checked, so a hand-built `VerifiedEnvelope`
/// yields an error rather than a panic.
pub fn decode_verified(verified: VerifiedEnvelope<'_>) -> Result<Envelope> {
    let mut cursor = Cursor::new(verified.payload);

    let envelope = match verified.message_type {
        MessageType::NanoappMessage => Envelope::NanoappMessage(NanoappMessage {
            app_id: cursor.u64()?,
            message_type: cursor.u32()?,
            host_endpoint: cursor.u16()?,
            message: Bytes::copy_from_slice(cursor.vector()?),
        }),
        MessageType::HubInfoRequest => Envelope::HubInfoRequest,
        MessageType::HubInfoResponse => Envelope::HubInfoResponse(HubInfoResponse {
            name: cursor.string("name")?,
            vendor: cursor.string("vendor")?,
            toolchain: cursor.string("toolchain")?,
            legacy_platform_version: cursor.u32()?,
            legacy_toolchain_version: cursor.u32()?,
            peak_mips: cursor.f32()?,
            stopped_power: cursor.f32()?,
            sleep_power: cursor.f32()?,
            peak_power: cursor.f32()?,
            max_message_len: cursor.u32()?,
            platform_id: cursor.u64()?,
            version: cursor.u32()?,
        }),
        MessageType::NanoappListRequest => Envelope::NanoappListRequest,
        MessageType::NanoappListResponse => {
            let count = cursor.u32()? as usize;
            let capacity = count.min(cursor.remaining() / NANOAPP_LIST_ENTRY_SIZE);
            let mut entries = Vec::with_capacity(capacity);
            for _ in 0..count {
                entries.push(NanoappListEntry {
                    app_id: cursor.u64()?,
                    app_version: cursor.u32()?,
                    enabled: cursor.bool("enabled")?,
                    is_system: cursor.bool("is_system")?,
                });
            }
            Envelope::NanoappListResponse(NanoappListResponse { entries })
        }
    };

    cursor.finish(verified.message_type)?;
    Ok(envelope)
}

/// Encode an envelope into a new buffer.
pub fn encode(envelope: &Envelope) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_into(envelope, &mut dst)?;
    Ok(dst.freeze())
}

/// Append an encoded envelope to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────┬──────────┬────────────┬──────────────────┐
/// │ Magic (2B) │ Version  │ Tag      │ Length     │ Payload          │
/// │ 0x48 0x42  │ (1B)     │ (1B)     │ (4B LE)    │ (Length bytes)   │
/// │ "HB"       │          │          │            │                  │
/// └────────────┴──────────┴──────────┴────────────┴──────────────────┘
/// ```
///
/// On error `dst` is left as it was.
pub fn encode_into(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let start = dst.len();
    let result = write_envelope(envelope, dst);
    if result.is_err() {
        dst.truncate(start);
    }
    result
}

fn write_envelope(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let start = dst.len();
    dst.reserve(HEADER_SIZE + NANOAPP_MESSAGE_FIXED_SIZE);
    dst.put_slice(&MAGIC);
    dst.put_u8(PROTOCOL_VERSION);
    dst.put_u8(envelope.message_type() as u8);
    dst.put_u32_le(0);
    let payload_start = dst.len();

    match envelope {
        Envelope::NanoappMessage(msg) => {
            dst.put_u64_le(msg.app_id);
            dst.put_u32_le(msg.message_type);
            dst.put_u16_le(msg.host_endpoint);
            put_vector(dst, &msg.message)?;
        }
        Envelope::HubInfoRequest | Envelope::NanoappListRequest => {}
        Envelope::HubInfoResponse(info) => {
            put_vector(dst, info.name.as_bytes())?;
            put_vector(dst, info.vendor.as_bytes())?;
            put_vector(dst, info.toolchain.as_bytes())?;
            dst.put_u32_le(info.legacy_platform_version);
            dst.put_u32_le(info.legacy_toolchain_version);
            dst.put_f32_le(info.peak_mips);
            dst.put_f32_le(info.stopped_power);
            dst.put_f32_le(info.sleep_power);
            dst.put_f32_le(info.peak_power);
            dst.put_u32_le(info.max_message_len);
            dst.put_u64_le(info.platform_id);
            dst.put_u32_le(info.version);
        }
        Envelope::NanoappListResponse(list) => {
            dst.put_u32_le(length_u32(list.entries.len())?);
            for entry in &list.entries {
                dst.put_u64_le(entry.app_id);
                dst.put_u32_le(entry.app_version);
                dst.put_u8(u8::from(entry.enabled));
                dst.put_u8(u8::from(entry.is_system));
            }
        }
    }

    let payload_len = length_u32(dst.len() - payload_start)?;
    dst[start + 4..start + 8].copy_from_slice(&payload_len.to_le_bytes());
    Ok(())
}

fn put_vector(dst: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    dst.put_u32_le(length_u32(bytes.len())?);
    dst.put_slice(bytes);
    Ok(())
}

fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| EnvelopeError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// Split one complete raw envelope off the front of a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete envelope yet.
/// Only the magic and length are checked; the returned bytes still need
/// [`verify_envelope`].
pub fn split_envelope(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = parse_header(src)?;
    if header.payload_len > max_payload {
        return Err(EnvelopeError::PayloadTooLarge {
            size: header.payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + header.payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    Ok(Some(src.split_to(total).freeze()))
}

/// Bounds-checked little-endian reader over a payload slice.
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, len: usize) -> Result<()> {
        if len > self.buf.len() {
            return Err(EnvelopeError::Truncated {
                needed: len,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        let mut bytes = self.take(1)?;
        Ok(bytes.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        let mut bytes = self.take(2)?;
        Ok(bytes.get_u16_le())
    }

    fn u32(&mut self) -> Result<u32> {
        let mut bytes = self.take(4)?;
        Ok(bytes.get_u32_le())
    }

    fn u64(&mut self) -> Result<u64> {
        let mut bytes = self.take(8)?;
        Ok(bytes.get_u64_le())
    }

    fn f32(&mut self) -> Result<f32> {
        let mut bytes = self.take(4)?;
        Ok(bytes.get_f32_le())
    }

    fn bool(&mut self, field: &'static str) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(EnvelopeError::InvalidBool { field, value }),
        }
    }

    fn vector(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.vector()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| EnvelopeError::InvalidUtf8 { field })
    }

    fn finish(self, message_type: MessageType) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(EnvelopeError::TrailingBytes {
                message_type: message_type.name(),
                count: self.buf.len(),
            });
        }
        Ok(())
    }
}
