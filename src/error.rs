//! Error handling for the deimos prober
//!
//! Per-probe failures are expected and folded away; only configuration
//! problems and socket exhaustion surface as `ScanError`.

use std::io;
use thiserror::Error;

/// Main error type for scan operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("port range error: {0}")]
    PortRange(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource exhaustion: {0}")]
    ResourceExhausted(io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidTarget(e.to_string())
    }
}

/// Why a single probe attempt failed.
///
/// Every variant means "try the next probe in the catalog"; the split exists
/// so the log stream can tell a refused connect from a dead timer. Only
/// socket exhaustion escalates past the prober.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("connection reset")]
    Reset,

    #[error("{0}")]
    Other(io::Error),
}

impl ProbeFailure {
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ProbeFailure::Refused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                ProbeFailure::Reset
            }
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProbeFailure::Timeout,
            _ => ProbeFailure::Other(err),
        }
    }

    /// File-descriptor exhaustion aborts the whole scan instead of the one
    /// probe.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProbeFailure::Other(err) => is_fd_exhaustion(err),
            _ => false,
        }
    }

    /// Escalate to the scan-level error type.
    pub fn into_fatal(self) -> ScanError {
        match self {
            ProbeFailure::Other(err) => ScanError::ResourceExhausted(err),
            other => ScanError::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
        }
    }
}

#[cfg(unix)]
fn is_fd_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE))
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_err: &io::Error) -> bool {
    false
}
