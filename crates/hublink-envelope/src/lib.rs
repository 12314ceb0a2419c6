//! Verified binary envelopes for host <-> hub messaging.
//!
//! Every envelope is laid out as:
//! - A 2-byte magic number ("HB") for stream synchronization
//! - A 1-byte layout version
//! - A 1-byte type tag selecting one of five message kinds
//! - A 4-byte little-endian payload length
//!
//! Received bytes are untrusted. [`verify_envelope`] walks the payload with
//! bounds checks before anything reads a field from it.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_verified, encode, encode_into, parse_header, split_envelope, verify,
    verify_envelope, EnvelopeConfig, EnvelopeHeader, VerifiedEnvelope, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE, MAGIC, PROTOCOL_VERSION,
};
pub use error::{EnvelopeError, Result};
pub use message::{
    Envelope, HubInfoResponse, MessageType, NanoappListEntry, NanoappListResponse, NanoappMessage,
};
pub use reader::EnvelopeReader;
pub use writer::EnvelopeWriter;
