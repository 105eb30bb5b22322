//! Error types for hapsync-renderer.

use std::path::PathBuf;

use thiserror::Error;

use hapsync_core::TopologyError;

/// All errors that can arise while building artifacts.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// The topology violates a precondition of the builder.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// HTTPS is enabled and a domain needs a certificate, but no directory is configured.
    #[error("domain '{domain}' needs a TLS certificate but certificate_dir is not set")]
    MissingCertificateDir { domain: String },
}
