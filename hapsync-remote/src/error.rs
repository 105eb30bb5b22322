//! Error types for hapsync-remote.

use thiserror::Error;

/// Exit status OpenSSH reports for its own failures (as opposed to the remote command's).
pub const SSH_FAILURE_STATUS: i32 = 255;

/// All errors that can arise from a remote session.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The session could not be established.
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    /// The session was lost or explicitly closed.
    #[error("remote session is no longer available")]
    Disconnected,

    /// A remote command ran and reported failure.
    #[error("remote command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Local I/O failure while driving the transport.
    #[error("I/O error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// `true` when the session itself is unusable and must be re-established.
    pub fn is_connection(&self) -> bool {
        matches!(self, RemoteError::Connect { .. } | RemoteError::Disconnected)
    }
}

/// Convenience constructor for [`RemoteError::Io`].
pub(crate) fn io_err(context: impl Into<String>, source: std::io::Error) -> RemoteError {
    RemoteError::Io {
        context: context.into(),
        source,
    }
}
