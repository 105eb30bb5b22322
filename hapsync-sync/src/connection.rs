//! Owner of the single remote session.

use std::sync::Arc;

use tokio::sync::Mutex;

use hapsync_remote::{Connector, RemoteError, RemoteSession};

/// Lazily establishes one session and hands out shared handles to it.
///
/// There is no pooling and no retry: a failed `connect` surfaces to the
/// caller and the next `acquire` tries again.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    session: Mutex<Option<Arc<dyn RemoteSession>>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            session: Mutex::new(None),
        }
    }

    /// The cached session, or a freshly established one.
    pub async fn acquire(&self) -> Result<Arc<dyn RemoteSession>, RemoteError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }
        tracing::debug!("establishing remote session");
        let session = self.connector.connect().await?;
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Close and forget the cached session. No-op when there is none.
    pub async fn release(&self) -> Result<(), RemoteError> {
        let taken = self.session.lock().await.take();
        match taken {
            Some(session) => {
                tracing::debug!("closing remote session");
                session.close().await
            }
            None => Ok(()),
        }
    }

    /// Forget the cached session without closing it, after it has failed.
    pub async fn discard(&self) {
        if self.session.lock().await.take().is_some() {
            tracing::warn!("discarding broken remote session");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }
}
