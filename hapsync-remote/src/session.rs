//! Remote execution capability.
//!
//! A [`Connector`] establishes sessions; a [`RemoteSession`] runs commands
//! and streams files over one established connection. Implementations must
//! tolerate concurrent calls on a shared session.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::shell;

#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run `program` with `args`, each quoted as a single word. Returns stdout.
    ///
    /// A non-zero exit status is an error.
    async fn exec(&self, program: &str, args: &[&str]) -> Result<String, RemoteError> {
        self.exec_shell(&shell::join_argv(program, args)).await
    }

    /// Run a raw command line through the remote shell. Returns stdout.
    async fn exec_shell(&self, command: &str) -> Result<String, RemoteError>;

    /// Stream `content` into `path`, truncating it. Resolves once the remote
    /// side has closed the stream.
    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError>;

    /// Dispose of the underlying connection. Later calls fail with
    /// [`RemoteError::Disconnected`].
    async fn close(&self) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new authenticated session.
    async fn connect(&self) -> Result<Arc<dyn RemoteSession>, RemoteError>;
}
