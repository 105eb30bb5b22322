//! Error types for hapsync-sync.

use thiserror::Error;

use hapsync_core::ConfigError;
use hapsync_remote::RemoteError;
use hapsync_renderer::RenderError;

/// All errors that can abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Artifacts could not be built; nothing was sent to the host.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A remote operation failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration or topology could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `sha256sum` answered with something that is not a digest.
    #[error("unexpected sha256sum output for {path}: {output:?}")]
    MalformedFingerprint { path: String, output: String },
}

impl SyncError {
    /// `true` when the cached session can no longer be trusted.
    pub fn is_connection(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_connection())
    }
}
