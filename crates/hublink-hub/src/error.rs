/// Errors that can occur in hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Envelope-level error.
    #[error("envelope error: {0}")]
    Envelope(#[from] hublink_envelope::EnvelopeError),

    /// A valid envelope the hub does not accept from the host.
    #[error("unexpected {0} from host")]
    UnexpectedMessage(&'static str),

    /// Invalid hub configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to bind the host link socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a hub socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: std::path::PathBuf,
        len: usize,
        max: usize,
    },

    /// I/O error outside envelope streams (e.g. reading a config file).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
