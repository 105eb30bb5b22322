//! Change detection.
//!
//! [`should_write`] is the per-artifact gate used by every pass: an artifact
//! is written when the remote copy is missing or its `sha256sum` differs from
//! the local fingerprint. [`remote_diff`] backs `hapsync diff` and fetches
//! the remote text so the operator can see what would change.

use similar::TextDiff;

use hapsync_core::fingerprint::parse_sha256sum;
use hapsync_remote::RemoteSession;
use hapsync_renderer::Artifact;

use crate::error::SyncError;
use crate::inventory::RemoteInventory;

/// Decide whether `artifact` must be (re)written. Consumes its inventory entry.
pub async fn should_write(
    session: &dyn RemoteSession,
    artifact: &Artifact,
    inventory: &RemoteInventory,
) -> Result<bool, SyncError> {
    if !inventory.take(&artifact.path) {
        tracing::debug!("absent on remote: {}", artifact.path);
        return Ok(true);
    }

    let output = session.exec("sha256sum", &[artifact.path.as_str()]).await?;
    let remote = parse_sha256sum(&output).ok_or_else(|| SyncError::MalformedFingerprint {
        path: artifact.path.clone(),
        output: output.trim().to_string(),
    })?;
    let local = artifact.fingerprint();
    if remote == local {
        tracing::debug!("fingerprint match: {}", artifact.path);
        Ok(false)
    } else {
        tracing::debug!("fingerprint mismatch: {} ({remote} != {local})", artifact.path);
        Ok(true)
    }
}

/// A unified diff between the remote copy and the rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub unified_diff: String,
}

/// Compare `artifact` with its remote copy. `None` when they are identical.
pub async fn remote_diff(
    session: &dyn RemoteSession,
    artifact: &Artifact,
    inventory: &RemoteInventory,
) -> Result<Option<FileDiff>, SyncError> {
    let existing = if inventory.take(&artifact.path) {
        session.exec("cat", &[artifact.path.as_str()]).await?
    } else {
        String::new()
    };
    Ok(unified_diff(&artifact.path, &existing, &artifact.content))
}

fn unified_diff(path: &str, old: &str, new: &str) -> Option<FileDiff> {
    if old == new {
        return None;
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    let old_header = format!("a/{name}");
    let new_header = format!("b/{name}");
    let unified = TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Some(FileDiff {
        path: path.to_string(),
        unified_diff: unified,
    })
}
