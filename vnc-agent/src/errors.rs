//! Error types for the automation client.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the automation client.
///
/// Five of the variants classify failures the way callers want to react to
/// them: transport trouble, elapsed waits, peer protocol violations,
/// rejected credentials, and locally rejected input. `State` covers misuse
/// of the facade itself (controller access while disconnected, recorder
/// start/stop mismatches).
#[derive(Debug, Error)]
pub enum VncError {
    /// Transport setup or teardown failure, or the peer closed mid-stream.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A bounded wait elapsed (connect or read).
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The server violated RFB 3.8 or sent unsupported content.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Security negotiation completed but the server rejected credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Local validation rejected the call before any bytes moved.
    #[error("Invalid input: {0}")]
    Input(String),

    /// The facade was used in the wrong state.
    #[error("Invalid state: {0}")]
    State(String),
}

impl VncError {
    /// Map an I/O error from the protocol crate onto the taxonomy.
    ///
    /// The protocol crate encodes the failure class in the `ErrorKind`;
    /// `timeout` is attached to `TimedOut` errors so callers see the bound
    /// that elapsed.
    pub(crate) fn from_io(err: io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout(timeout),
            io::ErrorKind::PermissionDenied => Self::Authentication(err.to_string()),
            io::ErrorKind::InvalidData | io::ErrorKind::Unsupported => {
                Self::Protocol(err.to_string())
            }
            io::ErrorKind::InvalidInput => Self::Input(err.to_string()),
            _ => Self::Connection(err.to_string()),
        }
    }

    /// True for errors that end the session (the facade disconnects before
    /// surfacing them).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }

    pub(crate) fn not_connected() -> Self {
        Self::State("not connected".into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VncError>;
