//! Unix socket link between a host process and the simulated hub.

use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hublink_envelope::{EnvelopeConfig, EnvelopeError, EnvelopeReader, EnvelopeWriter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::ProtocolContext;
use crate::error::{HubError, Result};
use crate::platform::SimulatedPlatform;

/// Listening end of the host link.
///
/// The socket file is created on bind and removed on drop, unless the path
/// was replaced by something else in the meantime.
pub struct HubListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl HubListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    // sockaddr_un.sun_path: 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen. A stale socket at `path` is replaced; any other kind
    /// of file is left alone and the bind fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(HubError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source| HubError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening for host connections");

        Ok(Self {
            listener,
            created_inode: Some((created.dev(), created.ino())),
            path,
        })
    }

    /// Accept the next host connection (blocking).
    pub fn accept(&self) -> Result<UnixStream> {
        self.listener.set_nonblocking(false)?;
        let (stream, _addr) = self.listener.accept()?;
        debug!("accepted host connection");
        Ok(stream)
    }

    /// Accept the next host connection, checking `running` every `poll`
    /// while idle. Returns `Ok(None)` once `running` is cleared.
    pub fn accept_while(
        &self,
        running: &AtomicBool,
        poll: Duration,
    ) -> Result<Option<UnixStream>> {
        self.listener.set_nonblocking(true)?;
        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    // Accepted sockets may inherit non-blocking mode.
                    stream.set_nonblocking(false)?;
                    debug!("accepted host connection");
                    return Ok(Some(stream));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => std::thread::sleep(poll),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HubListener {
    fn drop(&mut self) {
        let Some((dev, ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

/// Connect to a hub socket (blocking).
pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|source| HubError::Connect {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, "connected to hub socket");
    Ok(stream)
}

/// Counters for one served connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Envelopes read from the host.
    pub received: u64,
    /// Envelopes the dispatcher refused.
    pub rejected: u64,
    /// Simulated completions delivered.
    pub completions: u64,
    /// Envelopes written back to the host.
    pub sent: u64,
    /// Outbound envelopes over the link payload limit, not written.
    pub dropped: u64,
}

impl LinkStats {
    pub fn merge(&mut self, other: LinkStats) {
        self.received += other.received;
        self.rejected += other.rejected;
        self.completions += other.completions;
        self.sent += other.sent;
        self.dropped += other.dropped;
    }
}

/// Pump one host connection until it closes or `running` is cleared.
///
/// Every envelope read is dispatched, then queued simulated completions are
/// delivered, then everything in the outbox is written back. An outbound
/// envelope over `config.max_payload_size` is logged and skipped; the
/// connection stays up. A read timeout in `config` bounds how long a
/// shutdown request can go unnoticed.
pub fn serve_connection(
    ctx: &mut ProtocolContext<SimulatedPlatform>,
    stream: UnixStream,
    config: &EnvelopeConfig,
    running: &AtomicBool,
) -> Result<LinkStats> {
    let reader_stream = stream.try_clone()?;
    let mut reader = EnvelopeReader::with_config_unix(reader_stream, config.clone())?;
    let mut writer = EnvelopeWriter::with_config_unix(stream, config.clone())?;
    let mut stats = LinkStats::default();

    while running.load(Ordering::SeqCst) {
        let raw = match reader.read_raw() {
            Ok(raw) => raw,
            Err(EnvelopeError::ConnectionClosed) => {
                debug!("host disconnected");
                break;
            }
            Err(EnvelopeError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        stats.received += 1;
        if let Err(err) = ctx.route_host_message(&raw) {
            debug!(error = %err, "host envelope rejected");
            stats.rejected += 1;
        }
        stats.completions += ctx.deliver_completions() as u64;

        while let Some(outbound) = ctx.take_outbound() {
            match writer.send_raw(&outbound) {
                Ok(()) => stats.sent += 1,
                Err(EnvelopeError::PayloadTooLarge { size, max }) => {
                    warn!(size, max, "outbound envelope over payload limit, dropping");
                    stats.dropped += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(stats)
}
