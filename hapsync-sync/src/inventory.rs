//! Remote inventory: what already exists in the target directory.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hapsync_core::RemoteDir;
use hapsync_remote::{RemoteError, RemoteSession};

/// Paths found under the remote directory at the start of a pass.
///
/// Each artifact consults the inventory once via [`take`](Self::take); what
/// is left afterwards was not produced by the pass.
#[derive(Debug, Default)]
pub struct RemoteInventory {
    pending: Mutex<BTreeSet<String>>,
}

impl RemoteInventory {
    /// Ensure `dir` exists, then list everything beneath it.
    pub async fn scan(session: &dyn RemoteSession, dir: &RemoteDir) -> Result<Self, RemoteError> {
        session.exec("mkdir", &["-p", dir.as_str()]).await?;
        Self::list(session, dir).await
    }

    /// List `dir` without creating it. A missing directory is empty.
    pub async fn list(session: &dyn RemoteSession, dir: &RemoteDir) -> Result<Self, RemoteError> {
        let listing = match session.exec("find", &[dir.as_str()]).await {
            Ok(listing) => listing,
            Err(RemoteError::CommandFailed { ref stderr, .. }) if is_missing(stderr) => {
                tracing::debug!("{dir} does not exist yet");
                String::new()
            }
            Err(err) => return Err(err),
        };
        let inventory = Self::from_listing(dir, &listing);
        tracing::debug!(
            "found {} existing entries under {}",
            inventory.lock().len(),
            dir
        );
        Ok(inventory)
    }

    pub(crate) fn from_listing(dir: &RemoteDir, listing: &str) -> Self {
        let pending = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_end_matches('/'))
            .filter(|line| *line != dir.as_str())
            .map(str::to_string)
            .collect();
        Self {
            pending: Mutex::new(pending),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `path`, reporting whether it was present.
    pub fn take(&self, path: &str) -> bool {
        self.lock().remove(path)
    }

    /// Paths never taken, sorted.
    pub fn remaining(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

fn is_missing(stderr: &str) -> bool {
    stderr.contains("No such file or directory")
}
