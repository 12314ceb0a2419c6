/// Errors that can occur during envelope verification, decoding and encoding.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope header contains an invalid magic number.
    #[error("invalid envelope magic (expected 0x4842 \"HB\")")]
    InvalidMagic,

    /// The envelope was produced by an incompatible protocol revision.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// The type tag does not name a known message.
    #[error("unknown message type tag {0}")]
    UnknownMessageType(u8),

    /// A required field extends past the end of the buffer.
    #[error("truncated envelope: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// The declared payload length disagrees with the bytes present.
    #[error("payload length mismatch: header declares {declared}, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload carries bytes the message type does not account for.
    #[error("{count} trailing bytes after {message_type} payload")]
    TrailingBytes {
        message_type: &'static str,
        count: usize,
    },

    /// A boolean field holds something other than 0 or 1.
    #[error("invalid boolean value {value} in field {field}")]
    InvalidBool { field: &'static str, value: u8 },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in field {field}")]
    InvalidUtf8 { field: &'static str },

    /// The payload (or one of its vectors) exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("envelope I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete envelope was received.
    #[error("connection closed (incomplete envelope)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
